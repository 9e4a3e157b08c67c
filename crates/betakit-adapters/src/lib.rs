//! # betakit-adapters
//!
//! Target adapters for the Betakit engine.
//!
//! This crate provides implementations of the adapter contract for the four
//! target categories:
//! - Web applications (browser automation driver)
//! - Windows applications (WinAppDriver-style HTTP session)
//! - Games (image/input automation driver)
//! - VST plugins (DAW host driver)
//!
//! Each adapter validates its own typed configuration, manages the
//! connect/disconnect lifecycle, and delegates the actual automation to an
//! external driver through the [`DriverBackend`] seam — concrete browser,
//! game-engine, DAW, or UI-tree driving never lives in this repository.

mod driver;
mod game;
mod http_driver;
mod process_driver;
mod session;
pub mod testing;
mod vst;
mod web;
mod windows;

pub use driver::{DriverBackend, DriverReply};
pub use game::GameAdapter;
pub use http_driver::HttpDriver;
pub use process_driver::ProcessDriver;
pub use vst::VstAdapter;
pub use web::WebAdapter;
pub use windows::WindowsAdapter;

use betakit_core::AdapterRegistry;
use betakit_proto::{Adapter, Category, Result};

/// Registers every built-in adapter category into `registry`.
///
/// Called once at startup; a category that is already bound surfaces as
/// `Error::DuplicateCategory` rather than being silently shadowed.
pub fn register_defaults(registry: &AdapterRegistry) -> Result<()> {
    registry.register(Category::Web, || Box::new(WebAdapter::new()) as Box<dyn Adapter>)?;
    registry.register(Category::Windows, || {
        Box::new(WindowsAdapter::new()) as Box<dyn Adapter>
    })?;
    registry.register(Category::Game, || {
        Box::new(GameAdapter::new()) as Box<dyn Adapter>
    })?;
    registry.register(Category::Vst, || Box::new(VstAdapter::new()) as Box<dyn Adapter>)?;
    Ok(())
}
