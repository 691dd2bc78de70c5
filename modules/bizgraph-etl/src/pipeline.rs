//! Orchestration: cleanup → constraint registration → components.
//!
//! Every store mutation is awaited in sequence; concurrency is confined to
//! the read-side fan-outs inside containment and business search. A
//! component that fails at the top level is recorded and the run moves on.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info};
use typed_builder::TypedBuilder;

use bizgraph_common::names::{labels, layers};
use bizgraph_graph::{GraphBackend, SchemaCatalog};
use bizgraph_sources::{AdministrativeSource, BlockGroupSource, MetricsSource, PlaceSearch, ZipcodeSource};

use crate::businesses::build_businesses;
use crate::containment::build_block_group_containment;
use crate::enrichment::{build_enrichment_nodes, build_enrichment_relationships};
use crate::entities::{build_block_groups, build_cities, build_neighborhoods, build_zipcodes, collect_zipcodes};
use crate::report::{BatchReport, ComponentReport, PopulationReport};
use crate::topology::{build_city_relationships, build_neighborhood_relationships};
use crate::writer::GraphWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    BlockGroups,
    AdministrativeTopology,
    Businesses,
    Geoenrichments,
}

impl Component {
    /// Run order.
    pub const ALL: [Component; 4] = [
        Component::BlockGroups,
        Component::AdministrativeTopology,
        Component::Businesses,
        Component::Geoenrichments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::BlockGroups => "block_groups",
            Component::AdministrativeTopology => "administrative_topology",
            Component::Businesses => "businesses",
            Component::Geoenrichments => "geoenrichments",
        }
    }

    /// Node labels this component owns and cleans up.
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Component::BlockGroups => &[labels::BLOCK_GROUP],
            Component::AdministrativeTopology => &[labels::ZIPCODE, labels::CITY, labels::NEIGHBORHOOD],
            Component::Businesses => &[labels::BUSINESS],
            Component::Geoenrichments => &labels::ENRICHMENT,
        }
    }

    pub fn layers(&self) -> &'static [&'static str] {
        match self {
            Component::BlockGroups => &[layers::BLOCK_GROUP],
            Component::AdministrativeTopology => &[layers::ZIPCODE],
            Component::Businesses => &[layers::BUSINESS],
            Component::Geoenrichments => &[],
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Component::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Component::ALL.iter().map(Component::as_str).collect();
                format!("unknown component {s:?}; expected one of {}", known.join(", "))
            })
    }
}

/// Which components a run covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Include(Vec<Component>),
    Exclude(Vec<Component>),
}

impl Selection {
    /// Include and exclude lists are mutually exclusive.
    pub fn from_lists(include: Option<Vec<Component>>, exclude: Option<Vec<Component>>) -> Result<Self> {
        match (include, exclude) {
            (Some(_), Some(_)) => anyhow::bail!("only one of include or exclude can be given"),
            (Some(include), None) => Ok(Selection::Include(include)),
            (None, Some(exclude)) => Ok(Selection::Exclude(exclude)),
            (None, None) => Ok(Selection::All),
        }
    }

    /// Selected components in run order.
    pub fn components(&self) -> Vec<Component> {
        Component::ALL
            .into_iter()
            .filter(|c| match self {
                Selection::All => true,
                Selection::Include(list) => list.contains(c),
                Selection::Exclude(list) => !list.contains(c),
            })
            .collect()
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct PopulateOptions {
    #[builder(default)]
    pub selection: Selection,
    #[builder(default)]
    pub cleanup: bool,
    #[builder(default = 8)]
    pub read_concurrency: usize,
}

/// Upstream readers. A component whose reader is missing fails on its own.
#[derive(Clone, Default, TypedBuilder)]
pub struct Sources {
    #[builder(default, setter(strip_option))]
    pub administrative: Option<Arc<dyn AdministrativeSource>>,
    #[builder(default, setter(strip_option))]
    pub block_groups: Option<Arc<dyn BlockGroupSource>>,
    #[builder(default, setter(strip_option))]
    pub zipcodes: Option<Arc<dyn ZipcodeSource>>,
    #[builder(default, setter(strip_option))]
    pub metrics: Option<Arc<dyn MetricsSource>>,
    #[builder(default, setter(strip_option))]
    pub places: Option<Arc<dyn PlaceSearch>>,
}

pub struct Populator<'a> {
    writer: GraphWriter<'a>,
    sources: Sources,
}

impl<'a> Populator<'a> {
    pub fn new(graph: &'a dyn GraphBackend, catalog: &'a SchemaCatalog, sources: Sources) -> Self {
        Self {
            writer: GraphWriter::new(graph, catalog),
            sources,
        }
    }

    pub async fn run(&self, options: &PopulateOptions) -> PopulationReport {
        let components = options.selection.components();
        let mut report = PopulationReport::default();

        if options.cleanup {
            let cleanup = self.cleanup(&components).await;
            cleanup.log();
            report.cleanup = Some(cleanup);
        }

        let constraints = self.register_constraints().await;
        constraints.log();
        report.constraints = Some(constraints);

        for component in components {
            info!(component = component.as_str(), "Executing component");
            let mut component_report = ComponentReport::new(component);
            if let Err(e) = self
                .run_component(component, options.read_concurrency, &mut component_report)
                .await
            {
                let message = format!("{e:#}");
                error!(component = component.as_str(), error = message.as_str(), "Component aborted");
                component_report.error = Some(message);
            }
            report.components.push(component_report);
        }

        info!(
            failures = report.total_failures(),
            aborted = report.aborted().len(),
            "Population complete"
        );
        report
    }

    /// Create every uniqueness constraint the catalog declares. Idempotent.
    pub async fn register_constraints(&self) -> BatchReport {
        let mut report = BatchReport::new("constraints");
        for c in self.writer.catalog.uniqueness_constraints() {
            let result = self
                .writer
                .graph
                .create_uniqueness_constraint(&c.name, &c.label, &c.property)
                .await;
            report.record(c.name.as_str(), result);
        }
        report
    }

    /// Remove the constraints, nodes and spatial layers owned by `components`.
    pub async fn cleanup(&self, components: &[Component]) -> BatchReport {
        let mut report = BatchReport::new("cleanup");
        let owned: BTreeSet<&str> = components.iter().flat_map(|c| c.labels().iter().copied()).collect();

        for c in self.writer.catalog.uniqueness_constraints() {
            if owned.contains(c.label.as_str()) {
                let result = self.writer.graph.drop_constraint(&c.name).await;
                report.record(format!("constraint {}", c.name), result);
            }
        }

        for layer in components.iter().flat_map(|c| c.layers().iter().copied()) {
            let members: Vec<String> = self
                .writer
                .catalog
                .layer(layer)
                .map(|spec| spec.nodes.clone())
                .unwrap_or_default();
            for label in &members {
                let result = self.writer.graph.delete_by_label(label).await;
                report.record(format!("nodes {label}"), result);
            }
            let result = self.writer.graph.remove_layer(layer).await;
            report.record(format!("layer {layer}"), result);
        }

        for label in &owned {
            match self.writer.graph.delete_by_label(label).await {
                Ok(deleted) => {
                    info!(label = *label, deleted, "Deleted nodes");
                    report.succeeded += 1;
                }
                Err(e) => report.fail(format!("nodes {label}"), e),
            }
        }
        report
    }

    async fn run_component(
        &self,
        component: Component,
        read_concurrency: usize,
        report: &mut ComponentReport,
    ) -> Result<()> {
        let writer = self.writer;
        match component {
            Component::BlockGroups => {
                let source = self
                    .sources
                    .block_groups
                    .as_deref()
                    .context("block group source is not configured (DATABASE_URL)")?;
                writer.ensure_layers(component.layers()).await?;
                let rows = source.block_groups().await.context("reading block groups")?;
                report.push(build_block_groups(writer, &rows).await);
            }
            Component::AdministrativeTopology => {
                let administrative = self
                    .sources
                    .administrative
                    .as_deref()
                    .context("administrative source is not configured (DATABASE_URL)")?;
                let zipcode_source = self
                    .sources
                    .zipcodes
                    .as_deref()
                    .context("zipcode source is not configured")?;
                writer.ensure_layers(component.layers()).await?;

                let cities = administrative.cities().await.context("reading cities")?;
                let neighborhoods = administrative
                    .neighborhoods()
                    .await
                    .context("reading neighborhoods")?;
                let boundaries = zipcode_source.zipcodes().await.context("reading zipcodes")?;

                let zipcodes = collect_zipcodes(&cities, &neighborhoods, &boundaries);
                report.push(build_zipcodes(writer, &zipcodes).await);
                report.push(build_cities(writer, &cities).await);
                report.push(build_neighborhoods(writer, &neighborhoods).await);
                report.push(build_city_relationships(writer, &cities).await);
                report.push(build_neighborhood_relationships(writer, &neighborhoods).await);
                report.push(
                    build_block_group_containment(writer, read_concurrency)
                        .await
                        .context("computing block group containment")?,
                );
            }
            Component::Businesses => {
                let search = self
                    .sources
                    .places
                    .as_deref()
                    .context("place search is not configured (GOOGLE_PLACES_API_KEY)")?;
                writer.ensure_layers(component.layers()).await?;
                let (searches, placements) = build_businesses(writer, search, read_concurrency)
                    .await
                    .context("placing businesses")?;
                report.push(searches);
                report.push(placements);
            }
            Component::Geoenrichments => {
                let source = self
                    .sources
                    .metrics
                    .as_deref()
                    .context("metrics source is not configured")?;
                report.push(build_enrichment_nodes(writer).await);
                let rows = source.metrics().await.context("reading metrics")?;
                report.push(build_enrichment_relationships(writer, &rows).await);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_names_parse_loosely() {
        assert_eq!("block_groups".parse::<Component>(), Ok(Component::BlockGroups));
        assert_eq!(" Administrative-Topology".parse::<Component>(), Ok(Component::AdministrativeTopology));
        assert!("roads".parse::<Component>().is_err());
    }

    #[test]
    fn selection_keeps_run_order() {
        let include = Selection::Include(vec![Component::Geoenrichments, Component::BlockGroups]);
        assert_eq!(include.components(), vec![Component::BlockGroups, Component::Geoenrichments]);

        let exclude = Selection::Exclude(vec![Component::Businesses]);
        assert_eq!(
            exclude.components(),
            vec![
                Component::BlockGroups,
                Component::AdministrativeTopology,
                Component::Geoenrichments
            ]
        );
        assert_eq!(Selection::All.components(), Component::ALL.to_vec());
    }

    #[test]
    fn include_and_exclude_conflict() {
        assert!(Selection::from_lists(Some(vec![]), Some(vec![])).is_err());
        assert_eq!(Selection::from_lists(None, None).unwrap(), Selection::All);
    }

    #[test]
    fn enrichment_cleanup_touches_no_layers() {
        assert!(Component::Geoenrichments.layers().is_empty());
        assert_eq!(Component::Geoenrichments.labels().len(), 8);
    }
}
