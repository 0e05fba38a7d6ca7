use geojson::FeatureCollection;

use crate::query::ResourceKind;

/// Renders loaded datasets as map layers.
///
/// Calls arrive while the controller holds its registry lock, so
/// implementations must not call back into the controller.
pub trait DatasetPresenter: Send + Sync {
    fn present(&self, resource_kind: &ResourceKind, features: &FeatureCollection);

    fn hide(&self, resource_kind: &ResourceKind);

    /// The query succeeded with zero features.
    fn show_empty(&self, resource_kind: &ResourceKind);
}
