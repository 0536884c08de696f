use std::fmt;

use log::{debug, info};
use serde::Serialize;

use crate::cover::select_isoforms;
use crate::em::{estimate_psi, estimate_read_counts, Psi};
use crate::error::SpliceError;
use crate::graph::{ExonId, SpliceGraph};
use crate::module::{partition_components, partition_modules, Module};
use crate::paths::ModulePaths;
use crate::types::{EngineOptions, Exon};

/// Final result for one alternative-splicing module: the covering isoform
/// set and its estimated abundances.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    /// Genomic span `[start, end)` of the module.
    pub span: (u32, u32),
    /// Isoforms as ordered exon sequences, source to sink.
    pub isoforms: Vec<Vec<Exon>>,
    /// Estimated read count per isoform (same order).
    pub estimated_counts: Vec<f64>,
}

impl fmt::Display for ModuleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "module {}-{}: {} isoform(s)",
            self.span.0,
            self.span.1,
            self.isoforms.len()
        )?;
        for (path, count) in self.isoforms.iter().zip(&self.estimated_counts) {
            let exons: Vec<String> = path.iter().map(|e| e.to_string()).collect();
            writeln!(f, "  {:>10.2}  {}", count, exons.join(", "))?;
        }
        Ok(())
    }
}

/// Quantification of one target exon inside its module, with the
/// product-length lists handed to primer-design logic downstream.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub target: Exon,
    pub module: ModuleSummary,
    pub psi: Psi,
    /// Interior lengths of all inclusion paths (boundary and target exons
    /// excluded), from the full path enumeration.
    pub inclusion_lengths: Vec<u32>,
    /// Interior lengths of all skipping paths.
    pub skipping_lengths: Vec<u32>,
}

impl fmt::Display for TargetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "target exon {}: PSI = {}", self.target, self.psi)?;
        writeln!(
            f,
            "inclusion interior lengths: {:?}",
            self.inclusion_lengths
        )?;
        writeln!(f, "skipping interior lengths: {:?}", self.skipping_lengths)?;
        write!(f, "{}", self.module)
    }
}

/// Run the full pipeline for every module of a gene: partition, select a
/// covering isoform set, estimate abundances.
///
/// Per-module failures (AFE/ALE-like topology, covering stalls) are kept
/// isolated so the gene's remaining modules still produce results; the
/// outer error covers gene-level problems only (empty graph).
pub fn analyze_gene(
    graph: &SpliceGraph,
    opts: EngineOptions,
) -> Result<Vec<Result<ModuleSummary, SpliceError>>, SpliceError> {
    let modules = partition_modules(graph)?;
    info!(
        "gene on {}{}: {} module(s)",
        graph.chr(),
        graph.strand(),
        modules.len()
    );

    Ok(modules
        .into_iter()
        .map(|built| built.and_then(|module| summarize_module(graph, &module, opts)))
        .collect())
}

/// Quantify one target exon: resolve its module, build the covering isoform
/// set, estimate abundances and PSI, and enumerate the product lengths.
///
/// The target must already be resolved to an exon of the graph by the
/// caller. When no module contains it (the exon is constitutive relative to
/// all detected events), the nearest qualifying module is analyzed instead,
/// which reports the exon as never included.
pub fn analyze_target(
    graph: &SpliceGraph,
    target: Exon,
    opts: EngineOptions,
) -> Result<TargetReport, SpliceError> {
    let target_id = graph
        .exon_id(target)
        .ok_or_else(|| SpliceError::InvalidGraph {
            reason: format!("target exon {} is not a node of the splice graph", target),
        })?;

    let components = partition_components(graph)?;
    if components.is_empty() {
        return Err(SpliceError::InvalidGraph {
            reason: "no alternative-splicing module in this gene".to_string(),
        });
    }

    let component = resolve_component(graph, &components, target, target_id);
    let module = Module::build(graph, component)?;
    debug!(
        "target {} resolved to module {}",
        target,
        module.label()
    );

    let isoforms = select_isoforms(graph, &module, opts)?;
    let counts = estimate_read_counts(graph, &module, &isoforms, opts);
    let psi = estimate_psi(target_id, &isoforms, &counts);

    let all_paths = ModulePaths::enumerate(&module);
    let (inclusion_lengths, skipping_lengths) =
        all_paths.inclusion_skip_lengths(graph, target_id);

    info!(
        "target {} in module {}: {} isoform(s), PSI = {}",
        target,
        module.label(),
        isoforms.len(),
        psi
    );

    Ok(TargetReport {
        target,
        module: to_summary(graph, &module, &isoforms, counts),
        psi,
        inclusion_lengths,
        skipping_lengths,
    })
}

/// Pick the module component for a target exon: prefer components where the
/// target is an interior (alternative) exon, then any containing component,
/// then the nearest component by genomic distance.
fn resolve_component<'a>(
    graph: &SpliceGraph,
    components: &'a [Vec<ExonId>],
    target: Exon,
    target_id: ExonId,
) -> &'a Vec<ExonId> {
    if let Some(c) = components.iter().find(|c| {
        c.len() > 2 && c[1..c.len() - 1].contains(&target_id)
    }) {
        return c;
    }
    if let Some(c) = components.iter().find(|c| c.contains(&target_id)) {
        return c;
    }
    components
        .iter()
        .min_by_key(|c| {
            let span = Exon::new(
                graph.exon(c[0]).start,
                graph.exon(c[c.len() - 1]).end,
            );
            target.distance_to(span)
        })
        .expect("components checked non-empty")
}

fn summarize_module(
    graph: &SpliceGraph,
    module: &Module,
    opts: EngineOptions,
) -> Result<ModuleSummary, SpliceError> {
    let isoforms = select_isoforms(graph, module, opts)?;
    let counts = estimate_read_counts(graph, module, &isoforms, opts);
    Ok(to_summary(graph, module, &isoforms, counts))
}

fn to_summary(
    graph: &SpliceGraph,
    module: &Module,
    isoforms: &[Vec<ExonId>],
    estimated_counts: Vec<f64>,
) -> ModuleSummary {
    ModuleSummary {
        span: module.span(),
        isoforms: isoforms
            .iter()
            .map(|p| p.iter().map(|&id| graph.exon(id)).collect())
            .collect(),
        estimated_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SpliceGraph;
    use crate::types::Strand;

    fn ex(s: u32, e: u32) -> Exon {
        Exon::new(s, e)
    }

    /// Scenario: skipped target exon (20,30) with skipping support 8 and
    /// inclusion support 2+2, annotation knowing only the inclusion path.
    fn cassette_gene() -> SpliceGraph {
        let mut g = SpliceGraph::new("chr1", Strand::Plus);
        g.add_transcript_path(&[ex(0, 10), ex(20, 30), ex(50, 60)])
            .unwrap();
        g.set_junction_weight(ex(0, 10), ex(20, 30), 2.0).unwrap();
        g.set_junction_weight(ex(20, 30), ex(50, 60), 2.0).unwrap();
        g.set_junction_weight(ex(0, 10), ex(50, 60), 8.0).unwrap();
        g
    }

    #[test]
    fn cassette_exon_end_to_end() {
        let g = cassette_gene();
        let report = analyze_target(&g, ex(20, 30), EngineOptions::default()).unwrap();

        assert_eq!(report.module.span, (0, 60));
        assert_eq!(report.module.isoforms.len(), 2);

        // counts proportional to 4 (inclusion) vs 8 (skipping)
        let inc_idx = report
            .module
            .isoforms
            .iter()
            .position(|p| p.contains(&ex(20, 30)))
            .unwrap();
        assert!((report.module.estimated_counts[inc_idx] - 4.0).abs() < 1e-6);
        assert!((report.module.estimated_counts[1 - inc_idx] - 8.0).abs() < 1e-6);

        match report.psi {
            Psi::Defined(v) => assert!((v - 0.2).abs() < 1e-6, "psi {}", v),
            Psi::Undefined => panic!("psi should be defined"),
        }
        assert_eq!(report.inclusion_lengths, vec![0]);
        assert_eq!(report.skipping_lengths, vec![0]);
    }

    #[test]
    fn zero_coverage_reports_undefined_psi() {
        let mut g = SpliceGraph::new("chr1", Strand::Plus);
        g.add_transcript_path(&[ex(0, 10), ex(20, 30), ex(50, 60)])
            .unwrap();
        g.add_transcript_path(&[ex(0, 10), ex(50, 60)]).unwrap();

        let report = analyze_target(&g, ex(20, 30), EngineOptions::default()).unwrap();
        assert_eq!(report.psi, Psi::Undefined);
        assert!(report.module.estimated_counts.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn afe_like_module_fails_without_reaching_estimation() {
        let mut g = SpliceGraph::new("chr1", Strand::Plus);
        let (a, b, c, d) = (ex(0, 10), ex(20, 30), ex(40, 50), ex(60, 70));
        g.add_junction(a, c).unwrap();
        g.add_junction(a, d).unwrap();
        g.add_junction(b, c).unwrap();
        g.add_junction(b, d).unwrap();

        let err = analyze_target(&g, ex(40, 50), EngineOptions::default()).unwrap_err();
        assert!(matches!(err, SpliceError::ModuleTopology { .. }));
    }

    #[test]
    fn per_module_failures_do_not_block_other_modules() {
        // Well-formed cassette event followed by a K2,2-like event, joined
        // through intermediate single junctions so they stay separate
        // components.
        let mut g = cassette_gene();
        let (a, b, c, d) = (ex(100, 110), ex(120, 130), ex(140, 150), ex(160, 170));
        g.add_junction(a, c).unwrap();
        g.add_junction(a, d).unwrap();
        g.add_junction(b, c).unwrap();
        g.add_junction(b, d).unwrap();

        let results = analyze_gene(&g, EngineOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(SpliceError::ModuleTopology { .. })
        ));
    }

    #[test]
    fn unknown_target_exon_is_rejected() {
        let g = cassette_gene();
        let err = analyze_target(&g, ex(999, 1010), EngineOptions::default()).unwrap_err();
        assert!(matches!(err, SpliceError::InvalidGraph { .. }));
    }

    #[test]
    fn constitutive_target_falls_back_to_nearest_module() {
        // (70,80) hangs off the module sink by a single junction; the
        // cassette module is the nearest qualifying event.
        let mut g = cassette_gene();
        g.add_junction(ex(50, 60), ex(70, 80)).unwrap();

        let report = analyze_target(&g, ex(70, 80), EngineOptions::default()).unwrap();
        assert_eq!(report.module.span, (0, 60));
        // the target is never part of the module's paths
        assert!(report.inclusion_lengths.is_empty());
    }
}
