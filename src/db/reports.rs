use super::{Db, models::*, next_id, now_millis};
use crate::geo::Coordinate;
use rusqlite::{OptionalExtension, Result, Row, params};

const REPORT_COLUMNS: &str = "id, user_id, user_name, user_email, title, description, location, \
     latitude, longitude, image_url, status, timestamp, upvotes, remarks";

fn report_from_row(row: &Row<'_>) -> Result<DisasterReport> {
    let latitude: Option<f64> = row.get(7)?;
    let longitude: Option<f64> = row.get(8)?;
    Ok(DisasterReport {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        user_email: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        location: row.get(6)?,
        coordinates: latitude
            .zip(longitude)
            .map(|(latitude, longitude)| Coordinate {
                latitude,
                longitude,
            }),
        image_url: row.get(9)?,
        status: row.get(10)?,
        timestamp: row.get(11)?,
        upvotes: row.get(12)?,
        remarks: row.get(13)?,
    })
}

impl Db {
    /// All reports, newest first.
    pub fn list_reports(&self) -> Result<Vec<DisasterReport>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports ORDER BY timestamp DESC, seq DESC"
        ))?;
        let rows = stmt.query_map([], report_from_row)?;
        rows.collect()
    }

    /// Reports with the given status, newest first.
    pub fn list_reports_by_status(&self, status: ReportStatus) -> Result<Vec<DisasterReport>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE status = ? ORDER BY timestamp DESC, seq DESC"
        ))?;
        let rows = stmt.query_map(params![status], report_from_row)?;
        rows.collect()
    }

    /// Verified reports whose location or title contains `query`, ignoring
    /// case. A blank query matches nothing.
    pub fn search_verified_reports(&self, query: &str) -> Result<Vec<DisasterReport>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let reports = self.list_reports_by_status(ReportStatus::Verified)?;
        Ok(reports
            .into_iter()
            .filter(|r| {
                r.location.to_lowercase().contains(&needle)
                    || r.title.to_lowercase().contains(&needle)
            })
            .collect())
    }

    pub fn get_report(&self, id: &str) -> Result<Option<DisasterReport>> {
        self.conn
            .query_row(
                &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?"),
                params![id],
                report_from_row,
            )
            .optional()
    }

    /// Files a new report as pending with no upvotes.
    pub fn add_report(&mut self, report: &NewReport<'_>) -> Result<DisasterReport> {
        let tx = self.conn.transaction()?;
        let id = next_id(&tx, "reports", "r")?;
        let timestamp = now_millis();

        tx.execute(
            r#"
            INSERT INTO reports (id, user_id, user_name, user_email, title, description,
                location, latitude, longitude, image_url, status, timestamp, upvotes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
            params![
                id,
                report.user_id,
                report.user_name,
                report.user_email,
                report.title,
                report.description,
                report.location,
                report.coordinates.map(|c| c.latitude),
                report.coordinates.map(|c| c.longitude),
                report.image_url,
                ReportStatus::Pending,
                timestamp,
            ],
        )?;
        tx.commit()?;

        Ok(DisasterReport {
            id,
            user_id: report.user_id.to_string(),
            user_name: report.user_name.to_string(),
            user_email: report.user_email.to_string(),
            title: report.title.to_string(),
            description: report.description.to_string(),
            location: report.location.to_string(),
            coordinates: report.coordinates,
            image_url: report.image_url.to_string(),
            status: ReportStatus::Pending,
            timestamp,
            upvotes: 0,
            remarks: None,
        })
    }

    /// Verify or reject a report. Returns false when the id is unknown.
    pub fn update_report_status(
        &self,
        id: &str,
        status: ReportStatus,
        remarks: Option<&str>,
    ) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE reports SET status = ?, remarks = ? WHERE id = ?",
            params![status, remarks, id],
        )?;
        Ok(rows > 0)
    }

    pub fn upvote_report(&self, id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE reports SET upvotes = upvotes + 1 WHERE id = ?",
            params![id],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_report(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM reports WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }

    /// Report and donation totals for the admin dashboard.
    pub fn stats(&self) -> Result<DashboardStats> {
        let mut stats = DashboardStats::default();

        let mut stmt = self
            .conn
            .prepare("SELECT status, count(*) FROM reports GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, ReportStatus>(0)?, row.get::<_, usize>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            match status {
                ReportStatus::Pending => stats.pending = count,
                ReportStatus::Verified => stats.verified = count,
                ReportStatus::Rejected => stats.rejected = count,
            }
            stats.total_reports += count;
        }

        let (total, count, donors): (f64, usize, usize) = self.conn.query_row(
            "SELECT IFNULL(SUM(amount), 0.0), count(*), count(DISTINCT user_email) FROM donations",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        stats.total_donated = total;
        stats.donation_count = count;
        stats.distinct_donors = donors;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_report<'a>(title: &'a str, coordinates: Option<Coordinate>) -> NewReport<'a> {
        NewReport {
            user_id: "u1",
            user_name: "Arjun Kumar",
            user_email: "arjun@reliefnet.com",
            title,
            description: "Water entering ground floor homes",
            location: "Koramangala, Bangalore",
            coordinates,
            image_url: "",
        }
    }

    #[test]
    fn test_add_and_get_report() {
        let mut db = Db::open_in_memory().unwrap();
        let at = Coordinate {
            latitude: 12.9352,
            longitude: 77.6245,
        };
        let report = db.add_report(&new_report("Flooding", Some(at))).unwrap();

        assert_eq!(report.id, "r1");
        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.upvotes, 0);

        let stored = db.get_report("r1").unwrap().unwrap();
        assert_eq!(stored, report);
        assert!(db.get_report("missing").unwrap().is_none());
    }

    #[test]
    fn test_report_without_coordinates() {
        let mut db = Db::open_in_memory().unwrap();
        let report = db.add_report(&new_report("Power cut", None)).unwrap();
        let stored = db.get_report(&report.id).unwrap().unwrap();
        assert!(stored.coordinates.is_none());
    }

    #[test]
    fn test_ids_are_sequential_after_delete() {
        let mut db = Db::open_in_memory().unwrap();
        let first = db.add_report(&new_report("A", None)).unwrap();
        let second = db.add_report(&new_report("B", None)).unwrap();
        assert!(db.delete_report(&second.id).unwrap());
        let third = db.add_report(&new_report("C", None)).unwrap();

        assert_eq!(first.id, "r1");
        assert_eq!(second.id, "r2");
        assert_eq!(third.id, "r3");
    }

    #[test]
    fn test_list_newest_first() {
        let mut db = Db::open_in_memory().unwrap();
        db.seed_if_empty().unwrap();
        db.add_report(&new_report("Fresh", None)).unwrap();

        let titles: Vec<String> = db
            .list_reports()
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(
            titles,
            vec![
                "Fresh",
                "Severe Waterlogging at Silk Board",
                "Tree Fall in Indiranagar"
            ]
        );
    }

    #[test]
    fn test_update_status_and_remarks() {
        let mut db = Db::open_in_memory().unwrap();
        let report = db.add_report(&new_report("Flooding", None)).unwrap();

        assert!(db
            .update_report_status(&report.id, ReportStatus::Rejected, Some("Duplicate"))
            .unwrap());
        let stored = db.get_report(&report.id).unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Rejected);
        assert_eq!(stored.remarks.as_deref(), Some("Duplicate"));

        assert!(!db
            .update_report_status("nope", ReportStatus::Verified, None)
            .unwrap());
        assert_eq!(db.list_reports_by_status(ReportStatus::Rejected).unwrap().len(), 1);
    }

    #[test]
    fn test_search_verified_reports() {
        let mut db = Db::open_in_memory().unwrap();
        db.seed_if_empty().unwrap();
        let pending = db
            .add_report(&NewReport {
                location: "Indiranagar 12th Main, Bangalore",
                ..new_report("Open manhole", None)
            })
            .unwrap();

        let ids = |query: &str| -> Vec<String> {
            db.search_verified_reports(query)
                .unwrap()
                .into_iter()
                .map(|r| r.id)
                .collect()
        };

        // Location match, any case; the pending report stays out
        assert_eq!(ids("INDIRANAGAR"), vec!["r2"]);
        // Title match
        assert_eq!(ids("waterlogging"), vec!["r1"]);
        assert_eq!(ids("  bangalore "), vec!["r1", "r2"]);
        assert!(ids("Mysore").is_empty());
        assert!(ids("   ").is_empty());

        db.update_report_status(&pending.id, ReportStatus::Verified, None)
            .unwrap();
        let found = db.search_verified_reports("indiranagar").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, pending.id);
    }

    #[test]
    fn test_upvote_and_delete() {
        let mut db = Db::open_in_memory().unwrap();
        let report = db.add_report(&new_report("Flooding", None)).unwrap();
        assert!(db.upvote_report(&report.id).unwrap());
        assert!(db.upvote_report(&report.id).unwrap());
        assert_eq!(db.get_report(&report.id).unwrap().unwrap().upvotes, 2);

        assert!(db.delete_report(&report.id).unwrap());
        assert!(!db.delete_report(&report.id).unwrap());
    }

    #[test]
    fn test_stats() {
        let mut db = Db::open_in_memory().unwrap();
        db.seed_if_empty().unwrap();
        db.add_report(&new_report("Pending one", None)).unwrap();
        db.add_donation(&NewDonation {
            user_id: Some("u1"),
            donor_name: "Arjun Kumar",
            user_email: "arjun@reliefnet.com",
            amount: 500.0,
            campaign: "Bangalore Flood Relief",
        })
        .unwrap();
        db.add_donation(&NewDonation {
            user_id: Some("u1"),
            donor_name: "Arjun Kumar",
            user_email: "arjun@reliefnet.com",
            amount: 250.0,
            campaign: "Bangalore Flood Relief",
        })
        .unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_reports, 3);
        assert_eq!(stats.verified, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.total_donated, 750.0);
        assert_eq!(stats.donation_count, 2);
        assert_eq!(stats.distinct_donors, 1);
    }
}
