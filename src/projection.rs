// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Display aggregates over a file list and a storage account snapshot.

use serde::Serialize;
use utoipa::ToSchema;

use crate::blockchain::{FileAccount, StorageInfo};

/// Aggregates for display.
///
/// `total_files`/`total_bytes` are computed from the listed records;
/// `ledger_files`/`ledger_bytes` are what the storage account reports. After a
/// refresh the two agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StorageStats {
    pub total_files: u64,
    pub total_bytes: u64,
    pub public_files: u64,
    pub total_access: u64,
    pub ledger_files: u64,
    pub ledger_bytes: u64,
}

impl StorageStats {
    /// Project `files` and an optional storage snapshot. Absent info yields zeros
    /// for the ledger-reported totals.
    pub fn project<'a, I>(files: I, info: Option<&StorageInfo>) -> Self
    where
        I: IntoIterator<Item = &'a FileAccount>,
    {
        let mut stats = files.into_iter().fold(Self::default(), |mut acc, file| {
            acc.total_files += 1;
            acc.total_bytes = acc.total_bytes.saturating_add(file.file_size);
            if file.is_public {
                acc.public_files += 1;
            }
            acc.total_access = acc.total_access.saturating_add(file.access_count);
            acc
        });

        if let Some(info) = info {
            stats.ledger_files = u64::from(info.total_files);
            stats.ledger_bytes = info.total_storage_used;
        }
        stats
    }

    /// Whether the listed records account for the ledger's totals.
    pub fn is_reconciled(&self) -> bool {
        self.total_files == self.ledger_files && self.total_bytes == self.ledger_bytes
    }
}

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human-readable size with binary units and up to two decimals.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut divisor = 1u64;
    while unit + 1 < UNITS.len() && bytes >= divisor * 1024 {
        divisor *= 1024;
        unit += 1;
    }

    if bytes % divisor == 0 {
        return format!("{} {}", bytes / divisor, UNITS[unit]);
    }

    let value = format!("{:.2}", bytes as f64 / divisor as f64);
    let trimmed = value.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}
