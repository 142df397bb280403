use std::env;
use std::fs::create_dir_all;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use osm_history_importer::errors::Result;
use osm_history_importer::etl::build_geometries::BuildGeometriesEtl;
use osm_history_importer::etl::parse_history::ParseHistoryEtl;
use osm_history_importer::etl::Etl;
use osm_history_importer::{load_config, ImporterConfig};

const DEFAULT_CONFIG_PATH: &str = "config/importer.json";

fn create_output_dir(config: &ImporterConfig) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    let output_dir = Path::new(&config.output_dir).join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn run_stage<E: Etl>(etl: &mut E, dir: &Path, rebuild: bool) -> Result<()> {
    if rebuild {
        etl.rebuild(dir)
    } else {
        etl.process(dir)
    }
}

fn main() -> Result<()> {
    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(Path::new(&config_path))?;
    setup_logging(&config.log_level);
    info!(config_path = config_path.as_str(), mode:? = config.mode; "Starting import");

    let output_dir = create_output_dir(&config)?;
    run_stage(&mut ParseHistoryEtl::new(&config), &output_dir, config.rebuild)?;
    run_stage(&mut BuildGeometriesEtl::new(&config), &output_dir, config.rebuild)?;

    Ok(())
}
