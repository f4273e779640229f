//! Guest Registry
//!
//! The persistent record of guests and their RSVP. The engine reads guests,
//! updates the planned headcount and confirms attendance; everything else
//! about invitations lives outside this crate.

mod sqlite;

pub use sqlite::SqliteRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Guest not found: {0}")]
    GuestNotFound(String),
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Attendance tier printed on checkpoint notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttendanceTier {
    #[default]
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "VIP")]
    Vip,
    #[serde(rename = "VVIP")]
    Vvip,
}

impl AttendanceTier {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceTier::Normal => "normal",
            AttendanceTier::Vip => "VIP",
            AttendanceTier::Vvip => "VVIP",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "VIP" | "vip" => AttendanceTier::Vip,
            "VVIP" | "vvip" => AttendanceTier::Vvip,
            _ => AttendanceTier::Normal,
        }
    }
}

impl fmt::Display for AttendanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: String,
    pub phone_number: String,
    pub name: String,
    pub tier: AttendanceTier,
    pub headcount: u32,
    pub attendance_confirmed: bool,
    /// File name of the guest's QR ticket in media storage
    pub qr_image: Option<String>,
}

impl Guest {
    pub fn new(
        id: impl Into<String>,
        phone_number: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            phone_number: phone_number.into(),
            name: name.into(),
            tier: AttendanceTier::Normal,
            headcount: 1,
            attendance_confirmed: false,
            qr_image: None,
        }
    }

    #[must_use]
    pub fn with_tier(mut self, tier: AttendanceTier) -> Self {
        self.tier = tier;
        self
    }

    #[must_use]
    pub fn with_headcount(mut self, headcount: u32) -> Self {
        self.headcount = headcount;
        self
    }

    #[must_use]
    pub fn with_qr_image(mut self, file_name: impl Into<String>) -> Self {
        self.qr_image = Some(file_name.into());
        self
    }

    pub fn is_vip(&self) -> bool {
        self.tier == AttendanceTier::Vip
    }

    pub fn is_vvip(&self) -> bool {
        self.tier == AttendanceTier::Vvip
    }
}

/// Registry operations consumed by the engine
#[async_trait]
pub trait GuestRegistry: Send + Sync {
    async fn find_by_phone(&self, phone_number: &str) -> RegistryResult<Option<Guest>>;

    async fn find_by_id(&self, guest_id: &str) -> RegistryResult<Option<Guest>>;

    async fn update_headcount(&self, guest_id: &str, headcount: u32) -> RegistryResult<()>;

    /// Mark the guest as present; repeating it is harmless
    async fn set_attendance_confirmed(&self, guest_id: &str) -> RegistryResult<()>;

    /// Every registered phone number, for reminder broadcasts
    async fn list_phone_numbers(&self) -> RegistryResult<Vec<String>>;
}

#[async_trait]
impl<T: GuestRegistry + ?Sized> GuestRegistry for Arc<T> {
    async fn find_by_phone(&self, phone_number: &str) -> RegistryResult<Option<Guest>> {
        (**self).find_by_phone(phone_number).await
    }

    async fn find_by_id(&self, guest_id: &str) -> RegistryResult<Option<Guest>> {
        (**self).find_by_id(guest_id).await
    }

    async fn update_headcount(&self, guest_id: &str, headcount: u32) -> RegistryResult<()> {
        (**self).update_headcount(guest_id, headcount).await
    }

    async fn set_attendance_confirmed(&self, guest_id: &str) -> RegistryResult<()> {
        (**self).set_attendance_confirmed(guest_id).await
    }

    async fn list_phone_numbers(&self) -> RegistryResult<Vec<String>> {
        (**self).list_phone_numbers().await
    }
}
