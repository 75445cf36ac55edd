//! Creation and update metadata.
//!
//! Entities declared with [`EntityDescriptor::audited`](kiwi_core::EntityDescriptor::audited)
//! carry four extra guarded columns: who created/updated the row and when.
//! Implementing [`Audited`] for the entity type unlocks the stamping
//! writes on its models. Timestamps are stored as Unix seconds (UTC).

use chrono::{DateTime, Utc};
use kiwi_core::{AuditColumns, DescriptorError, Value};

use crate::error::Result;
use crate::model::{Entity, Model};

/// Marker for entities whose descriptor declares audit columns.
pub trait Audited: Entity {}

impl<'c, E: Audited> Model<'c, E> {
    /// Stamps the created and updated pairs with `actor` and the current
    /// time, then runs [`create`](Model::create).
    pub fn create_as(&mut self, actor: impl Into<Value>) -> Result<&mut Self> {
        self.create_as_at(actor, Utc::now())
    }

    /// Like [`create_as`](Self::create_as) with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Configuration`](crate::ModelError::Configuration)
    /// if the entity declares no audit columns, otherwise whatever
    /// [`create`](Model::create) returns. On failure the stamped fields are
    /// restored.
    pub fn create_as_at(
        &mut self,
        actor: impl Into<Value>,
        at: DateTime<Utc>,
    ) -> Result<&mut Self> {
        let columns = self.audit_columns()?;
        let actor = actor.into();
        let saved = self.values.clone();

        let stamped = self
            .stamp(&columns.created_at, &columns.created_by, &actor, at)
            .and_then(|model| model.stamp(&columns.updated_at, &columns.updated_by, &actor, at))
            .and_then(|model| model.create().map(|_| ()));
        if let Err(err) = stamped {
            self.values = saved;
            return Err(err);
        }
        Ok(self)
    }

    /// Stamps the updated pair with `actor` and the current time when there
    /// are pending changes, then runs [`update`](Model::update).
    ///
    /// Without pending changes nothing is stamped and the update fails with
    /// [`ModelError::State`](crate::ModelError::State); check
    /// [`changed`](Model::changed) first if that is not wanted.
    pub fn update_as(&mut self, actor: impl Into<Value>) -> Result<&mut Self> {
        self.update_as_at(actor, Utc::now())
    }

    /// Like [`update_as`](Self::update_as) with an explicit timestamp.
    pub fn update_as_at(
        &mut self,
        actor: impl Into<Value>,
        at: DateTime<Utc>,
    ) -> Result<&mut Self> {
        let columns = self.audit_columns()?;
        if !self.changed() {
            return self.update();
        }

        let actor = actor.into();
        let saved = self.values.clone();
        let stamped = self
            .stamp(&columns.updated_at, &columns.updated_by, &actor, at)
            .and_then(|model| model.update().map(|_| ()));
        if let Err(err) = stamped {
            self.values = saved;
            return Err(err);
        }
        Ok(self)
    }

    /// When the row was created, if stamped.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(|c| &c.created_at)
    }

    /// When the row was last updated, if stamped.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(|c| &c.updated_at)
    }

    pub fn created_by(&self) -> Option<&Value> {
        let columns = self.descriptor().audit.as_ref()?;
        self.get(&columns.created_by)
    }

    pub fn updated_by(&self) -> Option<&Value> {
        let columns = self.descriptor().audit.as_ref()?;
        self.get(&columns.updated_by)
    }

    fn audit_columns(&self) -> Result<AuditColumns> {
        let descriptor = self.descriptor();
        descriptor
            .audit
            .clone()
            .ok_or_else(|| DescriptorError::NotAudited(descriptor.table.clone()).into())
    }

    fn stamp(
        &mut self,
        at_column: &str,
        by_column: &str,
        actor: &Value,
        at: DateTime<Utc>,
    ) -> Result<&mut Self> {
        self.set(at_column, at.timestamp())?;
        self.set(by_column, actor.clone())
    }

    fn timestamp(&self, column: impl FnOnce(&AuditColumns) -> &String) -> Option<DateTime<Utc>> {
        let columns = self.descriptor().audit.as_ref()?;
        let seconds = self.get(column(columns))?.as_i64()?;
        DateTime::from_timestamp(seconds, 0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use chrono::TimeZone;
    use kiwi_core::{EntityDescriptor, FieldKind};
    use rusqlite::Connection;

    use super::*;
    use crate::{ModelError, create_table_sql};

    struct Posts;

    impl Entity for Posts {
        fn descriptor() -> &'static EntityDescriptor {
            static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
            DESCRIPTOR.get_or_init(|| {
                EntityDescriptor::new("posts")
                    .field("id", FieldKind::Integer)
                    .field("title", FieldKind::Text)
                    .guarded(Vec::<String>::new())
                    .audited()
            })
        }
    }

    impl Audited for Posts {}

    struct Plain;

    impl Entity for Plain {
        fn descriptor() -> &'static EntityDescriptor {
            static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
            DESCRIPTOR.get_or_init(|| {
                EntityDescriptor::new("plain")
                    .field("id", FieldKind::Integer)
                    .guarded(Vec::<String>::new())
            })
        }
    }

    impl Audited for Plain {}

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&create_table_sql(Posts::descriptor()).unwrap())
            .unwrap();
        conn
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_create_as_stamps_both_pairs() {
        let conn = conn();
        let mut post = Model::<Posts>::new(&conn).unwrap();
        post.fill([("title", "hello")]).unwrap();
        post.create_as_at(7, at(9)).unwrap();

        assert_eq!(post.created_at(), Some(at(9)));
        assert_eq!(post.updated_at(), Some(at(9)));
        assert_eq!(post.created_by(), Some(&Value::Integer(7)));
        assert_eq!(post.updated_by(), Some(&Value::Integer(7)));
        assert!(!post.changed());
    }

    #[test]
    fn test_update_as_stamps_only_updated_pair() {
        let conn = conn();
        let mut post = Model::<Posts>::new(&conn).unwrap();
        post.fill([("title", "hello")]).unwrap();
        post.create_as_at(7, at(9)).unwrap();

        post.fill([("title", "bye")]).unwrap();
        post.update_as_at(8, at(10)).unwrap();
        assert_eq!(post.created_by(), Some(&Value::Integer(7)));
        assert_eq!(post.updated_by(), Some(&Value::Integer(8)));
        assert_eq!(post.updated_at(), Some(at(10)));

        let mut loaded = Model::<Posts>::new(&conn).unwrap();
        loaded.find_or_fail(post.primary_key().clone()).unwrap();
        assert_eq!(loaded.created_at(), Some(at(9)));
        assert_eq!(loaded.updated_at(), Some(at(10)));
    }

    #[test]
    fn test_update_as_without_changes_is_a_state_error() {
        let conn = conn();
        let mut post = Model::<Posts>::new(&conn).unwrap();
        post.fill([("title", "hello")]).unwrap();
        post.create_as_at(7, at(9)).unwrap();

        let err = post.update_as_at(8, at(10)).unwrap_err();
        assert!(matches!(err, ModelError::State { .. }));
        assert_eq!(post.updated_by(), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_failed_update_restores_stamps() {
        let conn = conn();
        let mut post = Model::<Posts>::new(&conn).unwrap();
        post.fill([("title", "hello")]).unwrap();

        // never persisted, so update fails after stamping
        let err = post.update_as_at(8, at(10)).unwrap_err();
        assert!(matches!(err, ModelError::State { .. }));
        assert_eq!(post.updated_by(), Some(&Value::Null));
        assert_eq!(post.updated_at(), None);
    }

    #[test]
    fn test_audit_columns_are_guarded() {
        let conn = conn();
        let mut post = Model::<Posts>::new(&conn).unwrap();
        let err = post.fill([("created_by", 1)]).unwrap_err();
        assert!(matches!(err, ModelError::Guard { .. }));
    }

    #[test]
    fn test_stamping_requires_audit_columns() {
        let conn = Connection::open_in_memory().unwrap();
        let mut plain = Model::<Plain>::new(&conn).unwrap();
        let err = plain.create_as(1).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Configuration(DescriptorError::NotAudited(ref table)) if table == "plain"
        ));
        assert_eq!(plain.created_at(), None);
    }
}
