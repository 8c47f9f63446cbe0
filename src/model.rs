//! Row types shared by the API handlers and the domain modules.
//!
//! Postgres enums are mapped by [`pg_enum!`], which writes and reads the
//! textual label of each variant.

macro_rules! pg_enum {
    ($name:ident, $sql:path, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            serde::Serialize,
            serde::Deserialize,
            diesel::AsExpression,
            diesel::FromSqlRow,
        )]
        #[diesel(sql_type = $sql)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl diesel::serialize::ToSql<$sql, diesel::pg::Pg> for $name {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
            ) -> diesel::serialize::Result {
                use std::io::Write;
                out.write_all(self.as_str().as_bytes())?;
                Ok(diesel::serialize::IsNull::No)
            }
        }

        impl diesel::deserialize::FromSql<$sql, diesel::pg::Pg> for $name {
            fn from_sql(bytes: diesel::pg::PgValue<'_>) -> diesel::deserialize::Result<Self> {
                let raw = bytes.as_bytes();
                $(
                    if raw == $text.as_bytes() {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!(
                    "Unrecognized {} label: {}",
                    stringify!($name),
                    String::from_utf8_lossy(raw)
                )
                .into())
            }
        }
    };
}

pg_enum!(AppRole, crate::schema::sql_types::AppRole, {
    Student => "student",
    Judge => "judge",
    Admin => "admin",
    Superadmin => "superadmin",
});

pg_enum!(EventStatus, crate::schema::sql_types::EventStatus, {
    Upcoming => "upcoming",
    Ongoing => "ongoing",
    Completed => "completed",
});

pg_enum!(ApplicationStatus, crate::schema::sql_types::ApplicationStatus, {
    Applied => "applied",
    UnderReview => "under_review",
    Accepted => "accepted",
    Rejected => "rejected",
});

pg_enum!(EnrollmentStatus, crate::schema::sql_types::EnrollmentStatus, {
    Enrolled => "enrolled",
    InProgress => "in_progress",
    Completed => "completed",
    Dropped => "dropped",
});

impl AppRole {
    /// Higher values win when a user holds more than one role row.
    pub fn privilege(&self) -> u8 {
        match self {
            AppRole::Student => 0,
            AppRole::Judge => 1,
            AppRole::Admin => 2,
            AppRole::Superadmin => 3,
        }
    }
}

pub mod catalog;
pub mod dashboard;
pub mod registration;
pub mod workshop;
