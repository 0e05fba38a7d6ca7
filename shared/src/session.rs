use std::sync::Arc;
use tracing::{debug, info};

use crate::cancel::CancellationReason;
use crate::capabilities::Fetcher;
use crate::controller::{RequestController, RequestHandle};
use crate::error::OrchestratorResult;
use crate::event::UiEvent;
use crate::model::ViewState;
use crate::query::ResourceKind;
use crate::snapshot::{restore, snapshot};

/// Binds the map shell's widgets to the request controller.
pub struct MapSession<F: Fetcher + 'static, V: ViewState + ?Sized> {
    controller: RequestController<F>,
    view: Arc<V>,
    seismicity: ResourceKind,
}

impl<F: Fetcher + 'static, V: ViewState + ?Sized> MapSession<F, V> {
    #[must_use]
    pub fn new(controller: RequestController<F>, view: Arc<V>) -> Self {
        Self::with_resource_kind(controller, view, ResourceKind::seismicity())
    }

    #[must_use]
    pub fn with_resource_kind(
        controller: RequestController<F>,
        view: Arc<V>,
        seismicity: ResourceKind,
    ) -> Self {
        Self {
            controller,
            view,
            seismicity,
        }
    }

    #[must_use]
    pub fn controller(&self) -> &RequestController<F> {
        &self.controller
    }

    #[must_use]
    pub fn view(&self) -> &V {
        &self.view
    }

    /// Applies one UI action; returns the handle of any query it started.
    pub fn handle(&self, event: UiEvent) -> OrchestratorResult<Option<RequestHandle>> {
        match event {
            UiEvent::SeismicityModeChanged(mode) => {
                info!(?mode, "seismicity mode changed");
                self.view.set_seismicity_mode(mode);
                match mode.query_for(&self.seismicity) {
                    Some(query) => self.controller.submit(query).map(Some),
                    None => {
                        self.controller.hide(&self.seismicity);
                        Ok(None)
                    }
                }
            }
            UiEvent::RefreshRequested => {
                let selection = snapshot(self.view.as_ref());
                info!(mode = ?selection.seismicity, "refreshing view");
                restore(&selection, self.view.as_ref(), &self.controller, &self.seismicity)
            }
            UiEvent::CancelRequested => {
                self.controller
                    .cancel_current(&self.seismicity, CancellationReason::User);
                Ok(None)
            }
            UiEvent::ContinueWaitingRequested => {
                self.controller.continue_waiting(&self.seismicity);
                Ok(None)
            }
            UiEvent::StaticLayerToggled { layer, visible } => {
                debug!(%layer, label = layer.label(), visible, "static layer toggled");
                self.view.set_layer_visible(layer, visible);
                Ok(None)
            }
        }
    }
}
