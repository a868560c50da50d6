//! Initial data: the four SNSU campuses and the demo accounts.
//!
//! Seeding is idempotent. Existing campuses and users (matched by id and by
//! case-insensitive email) are left untouched, so re-running only fills gaps.
//! `--clear` truncates every campus-owned table first.

use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use super::accounts::hash_password;
use super::auth::AuthError;
use super::mock_auth::fixture_users;
use crate::geo::Coordinate;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("fixture is malformed: {0}")]
    Fixture(#[from] serde_json::Error),
    #[error("password hashing failed: {0}")]
    Hash(#[from] AuthError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct SeedCampus {
    pub id: i64,
    pub name: &'static str,
    pub code: &'static str,
    pub domain: &'static str,
    pub address: &'static str,
    pub phone: &'static str,
    pub email: &'static str,
    pub location: Coordinate,
    pub primary_color: &'static str,
    pub secondary_color: &'static str,
    pub logo_url: &'static str,
}

impl SeedCampus {
    #[must_use]
    pub fn branding(&self) -> serde_json::Value {
        json!({
            "primary_color": self.primary_color,
            "secondary_color": self.secondary_color,
            "logo_url": self.logo_url,
        })
    }
}

pub const CAMPUSES: [SeedCampus; 4] = [
    SeedCampus {
        id: 1,
        name: "Surigao del Norte State University",
        code: "SNSU",
        domain: "snsu.edu.ph",
        address: "Narciso St., Surigao City, Surigao del Norte",
        phone: "+63 86 826 1252",
        email: "info@snsu.edu.ph",
        location: Coordinate::from_static(9.7893, 125.4954),
        primary_color: "#22c55e",
        secondary_color: "#166534",
        logo_url: "/images/logos/snsu-logo.png",
    },
    SeedCampus {
        id: 2,
        name: "SNSU Malimono Campus",
        code: "MALIMONO",
        domain: "malimono.snsu.edu.ph",
        address: "Malimono, Surigao del Norte",
        phone: "+63 86 826 1253",
        email: "malimono@snsu.edu.ph",
        location: Coordinate::from_static(9.6167, 125.4833),
        primary_color: "#1e40af",
        secondary_color: "#1e3a8a",
        logo_url: "/images/logos/malimono-logo.png",
    },
    SeedCampus {
        id: 3,
        name: "SNSU Del Carmen Campus",
        code: "DELCARMEN",
        domain: "delcarmen.snsu.edu.ph",
        address: "Del Carmen, Surigao del Norte",
        phone: "+63 86 826 1254",
        email: "delcarmen@snsu.edu.ph",
        location: Coordinate::from_static(9.6000, 125.5000),
        primary_color: "#dc2626",
        secondary_color: "#991b1b",
        logo_url: "/images/logos/delcarmen-logo.png",
    },
    SeedCampus {
        id: 4,
        name: "SNSU Mainit Campus",
        code: "MAINIT",
        domain: "mainit.snsu.edu.ph",
        address: "Mainit, Surigao del Norte",
        phone: "+63 86 826 1255",
        email: "mainit@snsu.edu.ph",
        location: Coordinate::from_static(9.5500, 125.5167),
        primary_color: "#7c3aed",
        secondary_color: "#5b21b6",
        logo_url: "/images/logos/mainit-logo.png",
    },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub campuses_created: usize,
    pub users_created: usize,
}

/// Insert campuses (with multi-campus and cross-campus attendance enabled)
/// and the fixture users with bcrypt-hashed passwords.
///
/// # Errors
///
/// Returns [`SeedError`] if the fixture cannot be parsed, hashing fails, or
/// any statement fails. Partial progress is rolled back.
pub async fn run(pool: &PgPool, clear: bool) -> Result<SeedReport, SeedError> {
    let users = fixture_users()?;
    let mut hashes = Vec::with_capacity(users.len());
    for user in &users {
        hashes.push(hash_password(&user.password).await?);
    }

    let mut tx = pool.begin().await?;
    if clear {
        sqlx::query("TRUNCATE TABLE campuses RESTART IDENTITY CASCADE")
            .execute(&mut *tx)
            .await?;
        info!("cleared existing data");
    }

    let mut report = SeedReport::default();
    for campus in &CAMPUSES {
        let inserted = sqlx::query(
            "INSERT INTO campuses (id, name, code, domain, address, phone, email, latitude, longitude, branding_config)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(campus.id)
        .bind(campus.name)
        .bind(campus.code)
        .bind(campus.domain)
        .bind(campus.address)
        .bind(campus.phone)
        .bind(campus.email)
        .bind(campus.location.lat())
        .bind(campus.location.lng())
        .bind(campus.branding())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            info!(code = campus.code, "campus already exists");
            continue;
        }

        sqlx::query(
            "INSERT INTO campus_configurations
                 (campus_id, multi_campus_events_enabled, cross_campus_attendance_enabled)
             VALUES ($1, TRUE, TRUE)
             ON CONFLICT (campus_id) DO NOTHING",
        )
        .bind(campus.id)
        .execute(&mut *tx)
        .await?;
        report.campuses_created += 1;
        info!(code = campus.code, name = campus.name, "created campus");
    }

    // Explicit ids leave the serial behind.
    sqlx::query("SELECT setval(pg_get_serial_sequence('campuses', 'id'), (SELECT MAX(id) FROM campuses))")
        .execute(&mut *tx)
        .await?;

    for (user, hash) in users.iter().zip(&hashes) {
        let profile = &user.profile;
        let inserted = sqlx::query(
            "INSERT INTO users (email, password_hash, first_name, middle_name, last_name, role, campus_id,
                                student_id, department, course, year_level, section, phone, is_verified,
                                accessible_campus_ids)
             VALUES (lower($1), $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             ON CONFLICT DO NOTHING",
        )
        .bind(&profile.email)
        .bind(hash)
        .bind(&profile.first_name)
        .bind(&profile.middle_name)
        .bind(&profile.last_name)
        .bind(profile.role.as_str())
        .bind(profile.campus_id)
        .bind(profile.student_id.as_deref())
        .bind(&profile.department)
        .bind(&profile.course)
        .bind(&profile.year_level)
        .bind(&profile.section)
        .bind(&profile.phone)
        .bind(profile.is_verified)
        .bind(&profile.accessible_campus_ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted > 0 {
            report.users_created += 1;
            info!(email = %profile.email, role = %profile.role, "created user");
        } else {
            info!(email = %profile.email, "user already exists");
        }
    }

    tx.commit().await?;
    Ok(report)
}

#[cfg(test)]
#[path = "seed_test.rs"]
mod tests;
