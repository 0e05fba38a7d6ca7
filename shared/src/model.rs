use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::query::SeismicityMode;

/// The fire-once fault-trace layers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaticLayer {
    /// NSHM 2023 western-US fault sections.
    Usgs,
    /// Alaska fault-viewer traces.
    Ak,
    Ucerf31,
    Ucerf32,
}

impl StaticLayer {
    pub const ALL: [StaticLayer; 4] = [Self::Usgs, Self::Ak, Self::Ucerf31, Self::Ucerf32];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Usgs => "usgs",
            Self::Ak => "ak",
            Self::Ucerf31 => "ucerf31",
            Self::Ucerf32 => "ucerf32",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Usgs => "USGS NSHM 2023 faults",
            Self::Ak => "Alaska faults",
            Self::Ucerf31 => "UCERF 3.1 faults",
            Self::Ucerf32 => "UCERF 3.2 faults",
        }
    }

    #[must_use]
    pub const fn visible_by_default(self) -> bool {
        matches!(self, Self::Usgs)
    }
}

impl fmt::Display for StaticLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Everything a full refresh must put back the way the user left it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSelection {
    pub static_layers: BTreeMap<StaticLayer, bool>,
    pub seismicity: SeismicityMode,
}

impl ViewSelection {
    /// Start-up selection: default visibilities, no seismicity shown.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            static_layers: StaticLayer::ALL
                .into_iter()
                .map(|layer| (layer, layer.visible_by_default()))
                .collect(),
            seismicity: SeismicityMode::None,
        }
    }

    /// Layers missing from the map count as hidden.
    #[must_use]
    pub fn is_visible(&self, layer: StaticLayer) -> bool {
        self.static_layers.get(&layer).copied().unwrap_or(false)
    }
}

impl Default for ViewSelection {
    fn default() -> Self {
        Self::initial()
    }
}

/// Read/write access to the widgets that hold the user's selections.
pub trait ViewState: Send + Sync {
    fn layer_visible(&self, layer: StaticLayer) -> bool;
    fn seismicity_mode(&self) -> SeismicityMode;
    fn set_layer_visible(&self, layer: StaticLayer, visible: bool);
    fn set_seismicity_mode(&self, mode: SeismicityMode);
}

/// Headless [`ViewState`] for tests and the `quake-probe` CLI.
#[derive(Debug, Default)]
pub struct InMemoryView {
    selection: Mutex<ViewSelection>,
}

impl InMemoryView {
    #[must_use]
    pub fn new(selection: ViewSelection) -> Self {
        Self {
            selection: Mutex::new(selection),
        }
    }

    #[must_use]
    pub fn selection(&self) -> ViewSelection {
        self.selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ViewState for InMemoryView {
    fn layer_visible(&self, layer: StaticLayer) -> bool {
        self.selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_visible(layer)
    }

    fn seismicity_mode(&self) -> SeismicityMode {
        self.selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .seismicity
    }

    fn set_layer_visible(&self, layer: StaticLayer, visible: bool) {
        self.selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .static_layers
            .insert(layer, visible);
    }

    fn set_seismicity_mode(&self, mode: SeismicityMode) {
        self.selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .seismicity = mode;
    }
}
