//! Catalog data model: the row types persisted in and read from the
//! `SQLite`-backed [`crate::Catalog`].

pub mod download;
pub mod media_file;
pub mod media_item;
pub mod monitoring_rule;
pub mod quality;
pub mod release;
pub mod scheduler_job;
pub mod value;

pub use download::{Download, DownloadLogEntry, DownloadStatus, NewDownload};
pub use media_file::MediaFile;
pub use media_item::{MediaItem, MediaKind, NewMediaItem};
pub use monitoring_rule::{MonitorMode, MonitoringRule};
pub use quality::{MediaQualityState, QualityDefinition, QualityProfile, QualityProfileItem};
pub use release::Release;
pub use scheduler_job::SchedulerJob;
pub use value::{Value, ValueMap, parse_bag, serialize_bag};
