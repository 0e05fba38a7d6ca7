use tracing::{debug, instrument};

use crate::capabilities::Fetcher;
use crate::controller::{RequestController, RequestHandle};
use crate::error::OrchestratorResult;
use crate::model::{StaticLayer, ViewSelection, ViewState};
use crate::query::ResourceKind;

/// Reads the user's current selections. No side effects.
pub fn snapshot<V: ViewState + ?Sized>(view: &V) -> ViewSelection {
    ViewSelection {
        static_layers: StaticLayer::ALL
            .into_iter()
            .map(|layer| (layer, view.layer_visible(layer)))
            .collect(),
        seismicity: view.seismicity_mode(),
    }
}

/// Re-applies `selection` and re-drives the seismicity layer.
///
/// Static visibilities are written straight back. A `Recent` or `Custom`
/// mode resubmits its query and returns the new handle; `None` hides the
/// layer. Never waits for data: results arrive through the controller.
#[instrument(skip(selection, view, controller), fields(resource_kind = %resource_kind, mode = ?selection.seismicity))]
pub fn restore<F, V>(
    selection: &ViewSelection,
    view: &V,
    controller: &RequestController<F>,
    resource_kind: &ResourceKind,
) -> OrchestratorResult<Option<RequestHandle>>
where
    F: Fetcher + 'static,
    V: ViewState + ?Sized,
{
    for (&layer, &visible) in &selection.static_layers {
        view.set_layer_visible(layer, visible);
    }
    view.set_seismicity_mode(selection.seismicity);

    match selection.seismicity.query_for(resource_kind) {
        Some(query) => controller.submit(query).map(Some),
        None => {
            debug!("seismicity mode is none; hiding layer");
            controller.hide(resource_kind);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InMemoryView;
    use crate::query::SeismicityMode;

    #[test]
    fn test_snapshot_reads_every_layer() {
        let view = InMemoryView::new(ViewSelection::initial());
        view.set_layer_visible(StaticLayer::Ucerf32, true);
        view.set_seismicity_mode(SeismicityMode::Recent);

        let selection = snapshot(&view);
        assert_eq!(selection.static_layers.len(), StaticLayer::ALL.len());
        assert!(selection.is_visible(StaticLayer::Usgs));
        assert!(selection.is_visible(StaticLayer::Ucerf32));
        assert!(!selection.is_visible(StaticLayer::Ak));
        assert_eq!(selection.seismicity, SeismicityMode::Recent);
    }

    #[test]
    fn test_snapshot_is_detached_from_view() {
        let view = InMemoryView::new(ViewSelection::initial());
        let before = snapshot(&view);
        view.set_layer_visible(StaticLayer::Usgs, false);
        assert!(before.is_visible(StaticLayer::Usgs));
    }
}
