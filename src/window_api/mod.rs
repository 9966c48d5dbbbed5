//! Contains logic for observing the currently focused window on different
//! environments. The rest of the crate only depends on the [WindowObserver]
//! contract; concrete backends are selected through cargo features.

#[cfg(feature = "x11")]
pub mod x11;

use std::sync::Arc;

use anyhow::Result;

/// Identity of the window currently holding input focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusedWindow {
    /// Application identifier. For example 'firefox' or 'Code'.
    pub app_name: Arc<str>,
    /// Title text of the focused window.
    pub window_title: Arc<str>,
}

/// Contract for the platform-specific focus detection primitive.
///
/// `Ok(None)` is a legitimate absence (nothing focused, lock screen), not an
/// error; transient failures are reported as `Err`.
#[cfg_attr(test, mockall::automock)]
pub trait WindowObserver {
    fn focused_window(&mut self) -> Result<Option<FocusedWindow>>;
}

/// Creates the observer backend this build was compiled with.
pub fn create_observer() -> Result<Box<dyn WindowObserver + Send>> {
    #[cfg(feature = "x11")]
    {
        Ok(Box::new(x11::X11Observer::connect()?))
    }
    #[cfg(not(feature = "x11"))]
    {
        anyhow::bail!("no window detection backend compiled in; rebuild with `--features x11`")
    }
}
