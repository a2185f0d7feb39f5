use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use recordsync::{DurabilityMode, RecordStore, StorageFormat, SyncConfig};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recordsync")]
#[command(about = "Enter price/quantity records and list them")]
pub struct Cli {
    /// JSON config file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the record files
    #[arg(long, default_value = ".recordsync")]
    pub data_dir: PathBuf,

    /// Storage key the record list lives under
    #[arg(long)]
    pub key: Option<String>,

    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// fsync every write
    #[arg(long)]
    pub sync: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Json,
    Msgpack,
}

impl From<FormatArg> for StorageFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => StorageFormat::Json,
            FormatArg::Msgpack => StorageFormat::MessagePack,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the stored records
    List,
    /// Add a record; the total is derived from price and quantity
    Add {
        #[arg(long)]
        price: f64,
        #[arg(long)]
        quantity: f64,
    },
    /// Print the effective configuration as JSON
    Config,
}

pub struct App {
    store: RecordStore,
}

impl App {
    pub fn new(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                SyncConfig::from_json(&raw)?
            }
            None => SyncConfig::default(),
        };
        if config.data_dir.is_none() {
            config = config.data_dir(&cli.data_dir);
        }
        if let Some(key) = &cli.key {
            config = config.storage_key(key);
        }
        if let Some(format) = cli.format {
            config = config.format(format.into());
        }
        if cli.sync {
            config = config.durability(DurabilityMode::Sync);
        }

        let store = RecordStore::open(config)?;
        Ok(Self { store })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::List => self.list().await,
            Command::Add { price, quantity } => self.add(price, quantity).await,
            Command::Config => {
                println!("{}", serde_json::to_string_pretty(self.store.config())?);
                Ok(())
            }
        }
    }

    async fn list(&self) -> Result<()> {
        let form = self.store.form()?;
        form.settled_rows().await?;
        form.table()?.print();
        Ok(())
    }

    async fn add(&self, price: f64, quantity: f64) -> Result<()> {
        let mut form = self.store.form()?;
        form.settled_rows().await?;

        form.set_price(price);
        let total = form.set_quantity(quantity);
        if total == 0.0 {
            bail!("price and quantity must both be non-zero numbers");
        }

        let record = form.submit().await?;
        println!("Added {} x {} = {}", record.price, record.quantity, record.total);

        form.settled_rows().await?;
        form.table()?.print();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(temp_dir: &TempDir, args: &[&str]) -> Cli {
        let data_dir = temp_dir.path().to_str().unwrap();
        let mut argv = vec!["recordsync", "--data-dir", data_dir];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn test_add_rejects_zero_total() {
        let temp_dir = TempDir::new().unwrap();
        let cli = cli(&temp_dir, &["add", "--price", "0", "--quantity", "3"]);
        let app = App::new(&cli).unwrap();

        let err = app.run(cli.command).await.unwrap_err();
        assert!(err.to_string().contains("non-zero"));
        assert!(!temp_dir.path().join("formData.json").exists());
    }

    #[tokio::test]
    async fn test_add_appends_to_seed_rows() {
        let temp_dir = TempDir::new().unwrap();
        let cli = cli(&temp_dir, &["--key", "orders", "add", "--price", "2.5", "--quantity", "4"]);
        let app = App::new(&cli).unwrap();
        app.run(cli.command).await.unwrap();

        let rows = app.store.form().unwrap().settled_rows().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].total, 10.0);
        assert!(temp_dir.path().join("orders.json").exists());
    }

    #[tokio::test]
    async fn test_list_on_fresh_directory_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let cli = cli(&temp_dir, &["list"]);
        let app = App::new(&cli).unwrap();
        app.run(cli.command).await.unwrap();
        assert!(!temp_dir.path().join("formData.json").exists());
    }
}
