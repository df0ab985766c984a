//! Genome persistence: saving, loading and the run archive.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::schema::{ArchiveConfig, GenomeExport, GenomeMetadata};

use super::genome::{Genome, StructuralViolation};

/// Failure to read a genome file.
#[derive(Debug, thiserror::Error)]
pub enum GenomeLoadError {
    #[error("Failed to read genome file: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse genome file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid genome: {0}")]
    Structure(#[from] StructuralViolation),
}

/// Failure to write a genome file.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to write genome file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to serialize genome: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Write a genome and its metadata as JSON, creating parent directories.
pub fn save_genome<P: AsRef<Path>>(
    path: P,
    genome: &Genome,
    metadata: GenomeMetadata,
) -> Result<(), ArchiveError> {
    let path = path.as_ref();
    let io_err = |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let export = GenomeExport {
        metadata,
        genome: genome.to_record(),
    };
    let json = serde_json::to_string_pretty(&export)?;
    fs::write(path, json).map_err(io_err)
}

/// Read a genome file and validate every structural invariant.
pub fn load_genome<P: AsRef<Path>>(path: P) -> Result<Genome, GenomeLoadError> {
    load_export(path).map(|(genome, _)| genome)
}

/// Read a genome file together with its metadata.
pub fn load_export<P: AsRef<Path>>(path: P) -> Result<(Genome, GenomeMetadata), GenomeLoadError> {
    let content = fs::read_to_string(path)?;
    let export: GenomeExport = serde_json::from_str(&content)?;
    let genome = Genome::from_record(&export.genome)?;
    Ok((genome, export.metadata))
}

/// Output directory for a run: best-of-run saves and periodic autosaves.
#[derive(Debug, Clone)]
pub struct GenomeArchive {
    output_dir: PathBuf,
    config: ArchiveConfig,
    saved: Vec<PathBuf>,
}

impl GenomeArchive {
    /// Create an archive writing into `output_dir`.
    pub fn new<P: AsRef<Path>>(output_dir: P, config: ArchiveConfig) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            config,
            saved: Vec::new(),
        }
    }

    /// Archive configured by `config.output_dir`, if set.
    pub fn from_config(config: &ArchiveConfig) -> Option<Self> {
        config
            .output_dir
            .as_ref()
            .map(|dir| Self::new(dir, config.clone()))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Files written so far, oldest first.
    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }

    /// Save a new best-of-run genome. No-op when `save_best` is off.
    pub fn save_best(
        &mut self,
        genome: &Genome,
        metadata: GenomeMetadata,
    ) -> Result<Option<PathBuf>, ArchiveError> {
        if !self.config.save_best {
            return Ok(None);
        }
        let fitness = metadata.fitness.unwrap_or(0.0);
        let path = self.output_dir.join(format!(
            "best_gen_{}_fitness_{:.0}.json",
            metadata.generation, fitness
        ));
        save_genome(&path, genome, metadata)?;
        info!("New best genome saved: {}", path.display());
        self.saved.push(path.clone());
        Ok(Some(path))
    }

    /// Whether `generation` is due for an autosave.
    pub fn autosave_due(&self, generation: usize) -> bool {
        let interval = self.config.autosave_interval;
        interval > 0 && generation > 0 && generation % interval == 0
    }

    /// Save the top `save_top` of a ranked generation (best first).
    pub fn autosave<'a, I>(
        &mut self,
        generation: usize,
        ranked: I,
    ) -> Result<Vec<PathBuf>, ArchiveError>
    where
        I: IntoIterator<Item = (&'a Genome, GenomeMetadata)>,
    {
        let mut paths = Vec::new();
        for (i, (genome, metadata)) in ranked.into_iter().take(self.config.save_top).enumerate() {
            let rank = i + 1;
            let path = self
                .output_dir
                .join(format!("gen_{}_rank_{}.json", generation, rank));
            let metadata = GenomeMetadata {
                generation,
                rank: Some(rank),
                ..metadata
            };
            if let Err(e) = save_genome(&path, genome, metadata) {
                warn!("Autosave of generation {} stopped: {}", generation, e);
                return Err(e);
            }
            paths.push(path);
        }
        info!(
            "Autosaved top {} genomes for generation {}",
            paths.len(),
            generation
        );
        self.saved.extend(paths.iter().cloned());
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::gene::NodeRole;
    use crate::evolution::genome::interface_ids;
    use crate::evolution::innovation::InnovationRegistry;
    use crate::evolution::mutation::add_node;
    use crate::evolution::rng::GenomeRng;
    use crate::schema::{ConnectionRecord, GenomeConfig};
    use tempfile::TempDir;

    fn test_genome(id: u64) -> Genome {
        let (input_ids, output_ids) = interface_ids(3, 2);
        let registry = InnovationRegistry::new(5);
        let mut rng = GenomeRng::new(id);
        let config = GenomeConfig::default();
        let mut genome =
            Genome::create_minimal(id, &input_ids, &output_ids, &config, &registry, &mut rng)
                .unwrap();
        add_node(&mut genome, &config, &registry, &mut rng);
        genome
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("genome.json");
        let genome = test_genome(3);
        let metadata = GenomeMetadata {
            fitness: Some(1234.5),
            generation: 7,
            ..Default::default()
        };
        save_genome(&path, &genome, metadata.clone()).unwrap();

        let (loaded, loaded_meta) = load_export(&path).unwrap();
        assert_eq!(loaded, genome);
        assert_eq!(loaded_meta, metadata);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = load_genome(dir.path().join("absent.json"));
        assert!(matches!(result, Err(GenomeLoadError::Io(_))));
    }

    #[test]
    fn test_unknown_activation_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("genome.json");
        save_genome(&path, &test_genome(1), GenomeMetadata::default()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let tampered = content.replacen("\"Tanh\"", "\"Softsign\"", 1);
        assert_ne!(content, tampered);
        fs::write(&path, tampered).unwrap();
        assert!(matches!(load_genome(&path), Err(GenomeLoadError::Parse(_))));
    }

    #[test]
    fn test_cyclic_record_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("genome.json");
        let mut record = test_genome(1).to_record();
        let hidden = record
            .nodes
            .iter()
            .find(|n| n.role == NodeRole::Hidden)
            .unwrap()
            .id;
        let downstream = record
            .connections
            .iter()
            .find(|c| c.source == hidden)
            .unwrap()
            .target;
        // Close the loop hidden -> downstream -> hidden.
        record.connections.push(ConnectionRecord {
            innovation: 999,
            source: downstream,
            target: hidden,
            weight: 1.0,
            enabled: true,
        });
        let export = GenomeExport {
            metadata: GenomeMetadata::default(),
            genome: record,
        };
        fs::write(&path, serde_json::to_string(&export).unwrap()).unwrap();
        assert!(matches!(
            load_genome(&path),
            Err(GenomeLoadError::Structure(StructuralViolation::Cycle))
        ));
    }

    #[test]
    fn test_dangling_record_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("genome.json");
        let mut record = test_genome(2).to_record();
        record.connections[0].target = 4242;
        let export = GenomeExport {
            metadata: GenomeMetadata::default(),
            genome: record,
        };
        fs::write(&path, serde_json::to_string(&export).unwrap()).unwrap();
        assert!(matches!(
            load_genome(&path),
            Err(GenomeLoadError::Structure(
                StructuralViolation::DanglingEndpoint { node: 4242, .. }
            ))
        ));
    }

    #[test]
    fn test_archive_best_and_autosave() {
        let dir = TempDir::new().unwrap();
        let mut archive = GenomeArchive::new(
            dir.path(),
            ArchiveConfig {
                save_top: 2,
                autosave_interval: 5,
                ..Default::default()
            },
        );

        let best = archive
            .save_best(
                &test_genome(1),
                GenomeMetadata {
                    fitness: Some(2500.4),
                    generation: 3,
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert!(best.ends_with("best_gen_3_fitness_2500.json"));
        assert!(best.exists());

        assert!(!archive.autosave_due(0));
        assert!(!archive.autosave_due(4));
        assert!(archive.autosave_due(10));

        let genomes = [test_genome(1), test_genome(2), test_genome(3)];
        let paths = archive
            .autosave(
                10,
                genomes.iter().map(|g| (g, GenomeMetadata::default())),
            )
            .unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("gen_10_rank_1.json"));
        let (_, meta) = load_export(&paths[1]).unwrap();
        assert_eq!(meta.rank, Some(2));
        assert_eq!(meta.generation, 10);
        assert_eq!(archive.saved().len(), 3);
    }

    #[test]
    fn test_save_best_disabled() {
        let dir = TempDir::new().unwrap();
        let mut archive = GenomeArchive::new(
            dir.path(),
            ArchiveConfig {
                save_best: false,
                ..Default::default()
            },
        );
        let saved = archive
            .save_best(&test_genome(1), GenomeMetadata::default())
            .unwrap();
        assert!(saved.is_none());
        assert!(archive.saved().is_empty());
    }
}
