//! The `users` entity.
//!
//! Users reference each other through `friend_id` and through the audit
//! actor columns. Relation lookups are plain key lookups against the same
//! table; there is no join support.

use std::sync::OnceLock;

use kiwi_core::{EntityDescriptor, FieldKind, Operation, Value};
use kiwi_sqlite::{Audited, Entity, EntityState, Model, Result};

/// Entity type for the `users` table.
pub struct Users;

/// A row of the `users` table.
pub type User<'c> = Model<'c, Users>;

impl Entity for Users {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new("users")
                .primary_key("id")
                .field("id", FieldKind::Integer)
                .field("username", FieldKind::Text)
                .field("firstname", FieldKind::Text)
                .field("lastname", FieldKind::Text)
                .field("friend_id", FieldKind::Integer)
                .field("is_admin", FieldKind::Bool)
                .guarded(["is_admin"])
                .audited()
        })
    }

    fn validate(user: &User<'_>, operation: Operation) -> Vec<String> {
        let mut errors = Vec::new();
        if matches!(operation, Operation::Create | Operation::Update)
            && user.get("username").is_none_or(Value::is_empty)
        {
            errors.push("A username is required".to_string());
        }
        errors
    }
}

impl Audited for Users {}

/// Lookups of related users.
pub trait Relations<'c> {
    /// The user referenced by `friend_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`](kiwi_sqlite::ModelError::NotFound)
    /// when `friend_id` is empty or dangling.
    fn friend(&self) -> Result<User<'c>>;

    /// The user who created this one, if recorded and still present.
    fn creator(&self) -> Result<Option<User<'c>>>;

    /// The user who last updated this one, if recorded and still present.
    fn updater(&self) -> Result<Option<User<'c>>>;

    /// Every user this one created.
    fn created_users(&self) -> Result<Vec<User<'c>>>;
}

impl<'c> Relations<'c> for User<'c> {
    fn friend(&self) -> Result<User<'c>> {
        let key = self.get("friend_id").cloned().unwrap_or_default();
        let mut friend = self.fresh();
        friend.find_or_fail(key)?;
        Ok(friend)
    }

    fn creator(&self) -> Result<Option<User<'c>>> {
        find_by_column(self, "created_by")
    }

    fn updater(&self) -> Result<Option<User<'c>>> {
        find_by_column(self, "updated_by")
    }

    fn created_users(&self) -> Result<Vec<User<'c>>> {
        if self.primary_key().is_null() {
            return Ok(Vec::new());
        }
        let mut query = self.fresh();
        query
            .filter("created_by = ", self.primary_key().clone())
            .all(None)
    }
}

fn find_by_column<'c>(user: &User<'c>, column: &str) -> Result<Option<User<'c>>> {
    let Some(key) = user.get(column).filter(|v| !v.is_null()).cloned() else {
        return Ok(None);
    };
    let mut related = user.fresh();
    related.find(key)?;
    Ok((related.state() == EntityState::Persisted).then_some(related))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use kiwi_sqlite::{ModelError, create_table_sql};
    use rusqlite::Connection;

    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&create_table_sql(Users::descriptor()).unwrap())
            .unwrap();
        conn
    }

    fn create<'c>(conn: &'c Connection, username: &str, friend_id: Option<i64>) -> User<'c> {
        let mut user = User::new(conn).unwrap();
        user.fill([
            ("username", Value::from(username)),
            ("friend_id", Value::from(friend_id)),
        ])
        .unwrap()
        .create()
        .unwrap();
        user
    }

    #[test]
    fn test_username_required_on_create_and_update() {
        let conn = setup();
        let mut user = User::new(&conn).unwrap();
        let err = user.fill([("firstname", "Gustav")]).unwrap().create().unwrap_err();
        assert_eq!(err.to_string(), "cannot create users(): A username is required");

        let mut user = create(&conn, "GP", None);
        user.fill([("username", "")]).unwrap();
        assert!(matches!(
            user.update().unwrap_err(),
            ModelError::Validation { operation: Operation::Update, .. }
        ));

        user.reset().delete().unwrap();
    }

    #[test]
    fn test_is_admin_is_guarded() {
        let conn = setup();
        let mut user = User::new(&conn).unwrap();
        let err = user.fill([("is_admin", true)]).unwrap_err();
        assert_eq!(err.to_string(), "is_admin of users() is not mass assignable");
    }

    #[test]
    fn test_friend_lookup() {
        let conn = setup();
        let friend = create(&conn, "friend", None);
        let user = create(&conn, "me", friend.primary_key().as_i64());

        let found = user.friend().unwrap();
        assert_eq!(found.get("username"), Some(&Value::from("friend")));
        assert!(friend.friend().unwrap_err().is_not_found());
    }

    #[test]
    fn test_creator_and_created_users() {
        let conn = setup();
        let admin = create(&conn, "admin", None);
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let mut user = User::new(&conn).unwrap();
        user.fill([("username", "GP")]).unwrap();
        user.create_as_at(admin.primary_key().clone(), at).unwrap();

        let creator = user.creator().unwrap().unwrap();
        assert_eq!(creator.primary_key(), admin.primary_key());
        assert_eq!(user.updater().unwrap().unwrap().primary_key(), admin.primary_key());
        assert!(admin.creator().unwrap().is_none());

        let created = admin.created_users().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].get("username"), Some(&Value::from("GP")));
        assert_eq!(created[0].created_at(), Some(at));
    }

    #[test]
    fn test_dangling_creator_is_none() {
        let conn = setup();
        let mut user = User::new(&conn).unwrap();
        user.fill([("username", "GP")]).unwrap();
        user.create_as(424242).unwrap();
        assert!(user.creator().unwrap().is_none());
    }
}
