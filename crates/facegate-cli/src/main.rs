use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facegate_core::{DescriptorExtractor, EuclideanMatcher, MatchResult, Matcher};
use facegate_store::{NewProfile, ProfileGateway, ProfileStore};
use facegated::engine::{spawn_engine, EngineHandle};
use facegated::Config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facegate", about = "facegate profile administration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new profile from a photo
    Enroll {
        /// Display name for the profile
        #[arg(short, long)]
        name: String,
        /// Photo containing the person's face
        #[arg(short, long)]
        image: PathBuf,
        /// Extra attributes as a JSON object, e.g. '{"relation":"sister"}'
        #[arg(short, long)]
        metadata: Option<String>,
    },
    /// List enrolled profiles
    List,
    /// Remove an enrolled profile
    Remove {
        /// Profile ID to remove
        id: String,
    },
    /// Match a photo against enrolled profiles without the daemon
    Match {
        #[arg(short, long)]
        image: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.validate()?;

    match cli.command {
        Commands::Enroll { name, image, metadata } => {
            let metadata = parse_metadata(metadata.as_deref())?;
            let engine = load_engine(&config)?;
            let descriptor = engine.extract(read_image(&image)?).await?;
            let store = open_store(&config).await?;
            let profile = store
                .insert_profile(NewProfile { name, metadata, descriptor })
                .await?;
            println!("Enrolled {} ({})", profile.name, profile.id);
        }
        Commands::List => {
            let store = open_store(&config).await?;
            let profiles = store.list_profiles().await?;
            if profiles.is_empty() {
                println!("No profiles enrolled");
            }
            for profile in &profiles {
                println!("{}", serde_json::to_string(&profile.to_public())?);
            }
        }
        Commands::Remove { id } => {
            let store = open_store(&config).await?;
            if !store.remove_profile(&id).await? {
                bail!("no profile with id {id}");
            }
            println!("Removed {id} ({} remaining)", store.count_profiles().await?);
        }
        Commands::Match { image } => {
            let engine = load_engine(&config)?;
            let query = engine.extract(read_image(&image)?).await?;
            let store = open_store(&config).await?;
            let candidates = store.list_profiles().await?;
            match EuclideanMatcher.compare(&query, &candidates, &config.match_policy())? {
                MatchResult::Matched { profile, distance, confidence } => println!(
                    "Matched {} ({}) distance={distance:.4} confidence={confidence:.2}",
                    profile.name, profile.id
                ),
                MatchResult::NoMatch { closest_distance } => match closest_distance {
                    Some(d) => println!(
                        "No match: closest distance {d:.4} >= threshold {}",
                        config.match_threshold
                    ),
                    None => println!("No match: no profiles enrolled"),
                },
            }
        }
    }

    Ok(())
}

fn load_engine(config: &Config) -> Result<EngineHandle> {
    spawn_engine(
        &config.detector_path(),
        &config.recognizer_path(),
        config.descriptor_dim,
        config.multi_face_policy(),
    )
    .context("failed to load face models")
}

async fn open_store(config: &Config) -> Result<ProfileStore> {
    if let Some(dir) = config.db_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    ProfileStore::open(&config.db_path, config.descriptor_dim)
        .await
        .with_context(|| format!("failed to open {}", config.db_path.display()))
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn parse_metadata(raw: Option<&str>) -> Result<Map<String, Value>> {
    match raw {
        None => Ok(Map::new()),
        Some(raw) => match serde_json::from_str::<Value>(raw).context("metadata is not valid JSON")? {
            Value::Object(map) => Ok(map),
            _ => bail!("metadata must be a JSON object"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        assert!(parse_metadata(None).unwrap().is_empty());
        let map = parse_metadata(Some(r#"{"relation":"sister"}"#)).unwrap();
        assert_eq!(map["relation"], "sister");
        assert!(parse_metadata(Some("[1,2]")).is_err());
        assert!(parse_metadata(Some("not json")).is_err());
    }
}
