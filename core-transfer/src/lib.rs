//! # Transfer Module
//!
//! Reads and writes entry sets in the four supported file formats.
//!
//! ## Overview
//!
//! - [`parse_import`] turns file content into [`ImportEntry`] values, detecting
//!   the format when none is given. Parse failures are terminal: they are
//!   reported before anything is written to a store.
//! - [`render_export`] turns [`ExportRecord`] values into file content, with
//!   optional metadata controlled by [`ExportOptions`].
//!
//! | Format    | Shape |
//! |-----------|-------|
//! | full      | `{vaultName, vaultUri, exportedAt, secrets: [{name, value, attributes?}]}` |
//! | simple    | `[{name, value}]` |
//! | keyValue  | `{name: value}` |
//! | dotenv    | `NAME="value"` lines |

pub mod dotenv;
pub mod error;
pub mod export;
pub mod format;
pub mod import;

pub use error::{Result, TransferError};
pub use export::{render_export, ExportOptions, ExportRecord};
pub use format::TransferFormat;
pub use import::{parse_import, ImportEntry, ParsedImport};
