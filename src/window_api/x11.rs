use anyhow::{Context, Result};
use tracing::instrument;
use xcb::{
    x::{self, Atom, GetProperty, InternAtom, Window, ATOM_ANY, ATOM_WM_CLASS},
    Connection, Xid,
};

use super::{FocusedWindow, WindowObserver};

fn intern_atom(conn: &Connection, name: &[u8]) -> Result<Atom> {
    let reply = conn.wait_for_reply(conn.send_request(&InternAtom {
        only_if_exists: false,
        name,
    }))?;
    Ok(reply.atom())
}

/// Observes the focused window through EWMH properties: the active window
/// from `_NET_ACTIVE_WINDOW` on the root, its title from `_NET_WM_NAME`, and
/// the application name from the class half of `WM_CLASS`.
pub struct X11Observer {
    connection: Connection,
    preferred_screen: i32,
    active_window_atom: Atom,
    window_name_atom: Atom,
}

impl X11Observer {
    pub fn connect() -> Result<Self> {
        let (connection, preferred_screen) = Connection::connect(None)?;
        let active_window_atom = intern_atom(&connection, b"_NET_ACTIVE_WINDOW")?;
        let window_name_atom = intern_atom(&connection, b"_NET_WM_NAME")?;
        Ok(Self {
            connection,
            preferred_screen,
            active_window_atom,
            window_name_atom,
        })
    }

    fn root(&self) -> Result<Window> {
        self.connection
            .get_setup()
            .roots()
            .nth(self.preferred_screen.max(0) as usize)
            .map(|screen| screen.root())
            .context("preferred X11 screen disappeared")
    }

    /// Returns [None] when the root carries no active window, for example on
    /// an empty desktop or a lock screen.
    fn active_window(&self) -> Result<Option<Window>> {
        let reply = self.connection.wait_for_reply(self.connection.send_request(&GetProperty {
            delete: false,
            window: self.root()?,
            property: self.active_window_atom,
            r#type: ATOM_ANY,
            long_offset: 0,
            long_length: 1,
        }))?;
        let windows = reply.value::<Window>();
        match windows.first() {
            Some(window) if window.resource_id() != 0 => Ok(Some(*window)),
            _ => Ok(None),
        }
    }

    fn window_title(&self, window: Window) -> Result<String> {
        let reply = self.connection.wait_for_reply(self.connection.send_request(&GetProperty {
            delete: false,
            window,
            property: self.window_name_atom,
            r#type: ATOM_ANY,
            long_offset: 0,
            long_length: 1024,
        }))?;
        Ok(String::from_utf8_lossy(reply.value()).into_owned())
    }

    fn application_name(&self, window: Window) -> Result<String> {
        let reply = self.connection.wait_for_reply(self.connection.send_request(&GetProperty {
            delete: false,
            window,
            property: ATOM_WM_CLASS,
            r#type: x::ATOM_STRING,
            long_offset: 0,
            long_length: 1024,
        }))?;
        // WM_CLASS is "instance\0Class\0". The class half names the
        // application; fall back to the instance half when it is missing.
        let raw = reply.value::<u8>();
        let mut fields = raw.split(|byte| *byte == 0).filter(|field| !field.is_empty());
        let instance = fields.next();
        let class = fields.next().or(instance);
        Ok(class
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .unwrap_or_default())
    }
}

impl WindowObserver for X11Observer {
    #[instrument(skip(self))]
    fn focused_window(&mut self) -> Result<Option<FocusedWindow>> {
        let Some(window) = self.active_window()? else {
            return Ok(None);
        };
        let window_title = self.window_title(window)?;
        let app_name = self.application_name(window)?;
        Ok(Some(FocusedWindow {
            app_name: app_name.into(),
            window_title: window_title.into(),
        }))
    }
}
