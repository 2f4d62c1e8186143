use super::{Db, models::*, next_id, now_millis};
use rusqlite::{Result, Row, params};

/// Status given to every new donation.
pub const DONATION_RECEIVED: &str = "Received";

fn donation_from_row(row: &Row<'_>) -> Result<Donation> {
    Ok(Donation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        donor_name: row.get(2)?,
        user_email: row.get(3)?,
        amount: row.get(4)?,
        campaign: row.get(5)?,
        timestamp: row.get(6)?,
        status: row.get(7)?,
    })
}

impl Db {
    pub fn add_donation(&mut self, donation: &NewDonation<'_>) -> Result<Donation> {
        let tx = self.conn.transaction()?;
        let id = next_id(&tx, "donations", "d")?;
        let timestamp = now_millis();

        tx.execute(
            r#"
            INSERT INTO donations (id, user_id, donor_name, user_email, amount, campaign, timestamp, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                id,
                donation.user_id,
                donation.donor_name,
                donation.user_email,
                donation.amount,
                donation.campaign,
                timestamp,
                DONATION_RECEIVED,
            ],
        )?;
        tx.commit()?;

        Ok(Donation {
            id,
            user_id: donation.user_id.map(str::to_string),
            donor_name: donation.donor_name.to_string(),
            user_email: donation.user_email.to_string(),
            amount: donation.amount,
            campaign: donation.campaign.to_string(),
            timestamp,
            status: DONATION_RECEIVED.to_string(),
        })
    }

    /// All donations, newest first.
    pub fn list_donations(&self) -> Result<Vec<Donation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, donor_name, user_email, amount, campaign, timestamp, status
             FROM donations ORDER BY timestamp DESC, seq DESC",
        )?;
        let rows = stmt.query_map([], donation_from_row)?;
        rows.collect()
    }

    /// Donation history for one signed-in user.
    pub fn user_donations(&self, user_id: &str) -> Result<Vec<Donation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, donor_name, user_email, amount, campaign, timestamp, status
             FROM donations WHERE user_id = ? ORDER BY timestamp DESC, seq DESC",
        )?;
        let rows = stmt.query_map(params![user_id], donation_from_row)?;
        rows.collect()
    }

    pub fn update_donation_status(&self, id: &str, status: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE donations SET status = ? WHERE id = ?",
            params![status, id],
        )?;
        Ok(rows > 0)
    }
}
