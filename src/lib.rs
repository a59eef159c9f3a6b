//! Library entry for transwatch: keeps gettext PO files, i18next JSON
//! resources and source-code translation keys in sync while files change.

pub mod app;
pub mod content_store;
pub mod convert;
pub mod executor;
pub mod handlers;
pub mod host;
pub mod layout;
pub mod locks;
pub mod logging;
pub mod settings;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod translate;
pub mod watcher;
