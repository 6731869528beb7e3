//! Notification-area icon for the desktop window
//!
//! The OS toolkit sits behind [`TrayBackend`]; the window being controlled sits
//! behind [`WindowControl`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_TRAY_CONFIG: &str = "Source/config.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrayConfig {
    #[serde(rename = "Icon")]
    pub icon: PathBuf,
}

impl TrayConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayAction {
    Quit,
    Show,
    Hide,
}

impl TrayAction {
    /// Menu order.
    pub fn all() -> [TrayAction; 3] {
        [TrayAction::Quit, TrayAction::Show, TrayAction::Hide]
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrayAction::Quit => "Quit",
            TrayAction::Show => "Show",
            TrayAction::Hide => "Hide",
        }
    }

    pub fn apply<W: WindowControl + ?Sized>(&self, window: &mut W) {
        match self {
            TrayAction::Quit => window.quit(),
            TrayAction::Show => window.set_window_opacity(1.0),
            TrayAction::Hide => window.set_window_opacity(0.0),
        }
    }
}

/// The window the tray menu acts on.
pub trait WindowControl {
    fn quit(&mut self);
    fn set_window_opacity(&mut self, opacity: f32);
}

pub trait TrayBackend {
    fn set_icon(&mut self, icon: &Path) -> Result<()>;
    fn set_menu(&mut self, menu: &TrayMenu);
    fn show(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayMenu {
    actions: Vec<TrayAction>,
}

impl Default for TrayMenu {
    fn default() -> Self {
        Self {
            actions: TrayAction::all().to_vec(),
        }
    }
}

impl TrayMenu {
    pub fn actions(&self) -> &[TrayAction] {
        &self.actions
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.actions.iter().map(TrayAction::label).collect()
    }

    /// Run the action at `index`, as reported by the backend's click event.
    pub fn trigger<W: WindowControl + ?Sized>(&self, index: usize, window: &mut W) -> bool {
        match self.actions.get(index) {
            Some(action) => {
                tracing::debug!("tray action: {}", action.label());
                action.apply(window);
                true
            }
            None => false,
        }
    }
}

/// Set the icon, attach the menu and show it.
pub fn install_tray<B: TrayBackend>(backend: &mut B, config: &TrayConfig) -> Result<TrayMenu> {
    let menu = TrayMenu::default();
    backend.set_icon(&config.icon)?;
    backend.set_menu(&menu);
    backend.show();
    Ok(menu)
}
