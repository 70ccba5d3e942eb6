use clap::{Parser, Subcommand};
use lightbox::cache::DerivedCache;
use lightbox::catalog::{Catalog, CatalogError, FileCatalog};
use lightbox::config::{self, LightboxConfig};
use lightbox::imaging::RustBackend;
use lightbox::import::{self, ImportOptions};
use lightbox::output;
use lightbox::pipeline::Pipeline;
use lightbox::types::ImportRequest;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lightbox")]
#[command(about = "Photo gallery manager: bulk archive import and derived-image specs")]
#[command(long_about = "\
Photo gallery manager: bulk archive import and derived-image specs

Photos are imported from zip archives into galleries and titled in
sequence (\"Trip 1\", \"Trip 2\", ...). Derived images (thumbnails, display
sizes) are described by named specs in the config file and rendered on
demand into an on-disk cache.

Store layout:

  lightbox-data/
  ├── catalog.json          # Galleries and photos
  ├── catalog.lock          # Serializes writers across processes
  ├── originals/            # Uploaded images, one per photo
  └── cache/                # Rendered derived images
      └── <photo>/<spec>.<digest>.<ext>

Run 'lightbox gen-config' to generate a documented lightbox.toml.")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Store directory (overrides storage.root)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import every image in a zip archive into a gallery
    Import {
        /// Zip archive to import
        archive: PathBuf,
        /// Gallery title, and prefix for the photo titles
        #[arg(long)]
        title: String,
        /// Add to this existing gallery instead of creating one
        #[arg(long)]
        gallery: Option<String>,
        /// Caption for every imported photo
        #[arg(long, default_value = "")]
        caption: String,
        /// Description for a newly created gallery
        #[arg(long, default_value = "")]
        description: String,
        /// Mark the gallery and photos as not public
        #[arg(long)]
        private: bool,
        /// Skip rendering pre-cached specs after import
        #[arg(long)]
        no_prewarm: bool,
    },
    /// Render a photo with a named spec
    Render {
        /// Photo slug
        photo: String,
        /// Spec name
        spec: String,
        /// Write the derived image to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render pre-cached specs for one photo, or for all photos
    Prewarm {
        /// Photo slug (all photos when omitted)
        photo: Option<String>,
    },
    /// Remove a photo's derived images from the cache
    Purge {
        /// Photo slug
        photo: String,
    },
    /// List configured specs and their stages
    Specs,
    /// List galleries, newest first
    Galleries,
    /// Validate an archive without importing it
    Check {
        /// Zip archive to check
        archive: PathBuf,
    },
    /// Print a stock lightbox.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut site = config::load_config(&cli.config)?;
    if let Some(root) = cli.root {
        site.storage.root = root;
    }
    let registry = site.registry()?;
    init_thread_pool(&site.processing);

    match cli.command {
        Command::Import {
            archive,
            title,
            gallery,
            caption,
            description,
            private,
            no_prewarm,
        } => {
            let catalog = FileCatalog::open(&site.catalog_dir())?;
            let request = ImportRequest {
                archive: std::fs::read(&archive)?,
                gallery,
                title,
                caption,
                description,
                is_public: !private,
            };
            let outcome = import::import_archive(&catalog, request, &import_options(&site))?;
            output::print_import_output(&outcome);

            if !no_prewarm && !outcome.photos.is_empty() {
                let backend = RustBackend::new();
                let cache = DerivedCache::new(site.cache_dir());
                let pipeline = Pipeline::new(&registry, &backend, &catalog, &cache);
                let reports = pipeline.prewarm_all(&outcome.photos);
                output::print_prewarm_output(&reports, &cache.stats().snapshot());
            }
        }
        Command::Render { photo, spec, out } => {
            let catalog = FileCatalog::open(&site.catalog_dir())?;
            let photo = catalog
                .photo(&photo)?
                .ok_or(CatalogError::PhotoNotFound(photo))?;
            let backend = RustBackend::new();
            let cache = DerivedCache::new(site.cache_dir());
            let pipeline = Pipeline::new(&registry, &backend, &catalog, &cache);
            let image = pipeline.render(&photo, &spec)?;
            if let Some(path) = &out {
                std::fs::write(path, &image.bytes)?;
            }
            output::print_render_output(&image, out.as_deref());
        }
        Command::Prewarm { photo } => {
            let catalog = FileCatalog::open(&site.catalog_dir())?;
            let photos = match photo {
                Some(slug) => vec![
                    catalog
                        .photo(&slug)?
                        .ok_or(CatalogError::PhotoNotFound(slug))?,
                ],
                None => catalog.photos()?,
            };
            let backend = RustBackend::new();
            let cache = DerivedCache::new(site.cache_dir());
            let pipeline = Pipeline::new(&registry, &backend, &catalog, &cache);
            let reports = pipeline.prewarm_all(&photos);
            output::print_prewarm_output(&reports, &cache.stats().snapshot());
        }
        Command::Purge { photo } => {
            let catalog = FileCatalog::open(&site.catalog_dir())?;
            let photo = catalog
                .photo(&photo)?
                .ok_or(CatalogError::PhotoNotFound(photo))?;
            let backend = RustBackend::new();
            let cache = DerivedCache::new(site.cache_dir());
            let removed = Pipeline::new(&registry, &backend, &catalog, &cache).purge(&photo)?;
            println!("Removed {} cached images for {}", removed, photo.slug);
        }
        Command::Specs => {
            output::print_specs_output(&registry);
        }
        Command::Galleries => {
            let catalog = FileCatalog::open(&site.catalog_dir())?;
            output::print_galleries_output(&catalog.galleries()?);
        }
        Command::Check { archive } => {
            let bytes = std::fs::read(&archive)?;
            println!("==> Checking {}", archive.display());
            let reports = import::inspect_archive(&bytes, &import_options(&site))?;
            output::print_check_output(&reports);
        }
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `lightbox=info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lightbox=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn import_options(site: &LightboxConfig) -> ImportOptions {
    ImportOptions {
        skip_prefix: site.import.skip_prefix.clone(),
        cancel: None,
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
