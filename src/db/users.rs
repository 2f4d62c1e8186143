use super::{Db, models::*};
use rusqlite::{OptionalExtension, Result, params};

impl Db {
    /// Insert or replace a user profile.
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO users (id, name, email, role, avatar) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                role = excluded.role,
                avatar = excluded.avatar
            "#,
            params![user.id, user.name, user.email, user.role, user.avatar],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT id, name, email, role, avatar FROM users WHERE id = ?",
                params![id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        role: row.get(3)?,
                        avatar: row.get(4)?,
                    })
                },
            )
            .optional()
    }

    pub fn update_user_role(&self, id: &str, role: UserRole) -> Result<bool> {
        let rows = self
            .conn
            .execute("UPDATE users SET role = ? WHERE id = ?", params![role, id])?;
        Ok(rows > 0)
    }
}
