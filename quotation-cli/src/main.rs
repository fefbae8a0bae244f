use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use quotation_app::{
  image_refs, render_quotation, resolve_db_path, resolve_images, send_quotation, Catalog, Customer,
  EmailRequest, Product, Quotation, QuotationError, QuotationStatus, RenderOptions, SettingsPatch, Store,
};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "quotation", about = "Build, total, render and send quotations")]
struct Cli {
  /// SQLite database file.
  #[arg(long, env = "QUOTATION_DB", global = true)]
  db: Option<PathBuf>,

  /// TrueType font to embed in rendered PDFs.
  #[arg(long, env = "QUOTATION_FONT", global = true)]
  font: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  Settings {
    #[command(subcommand)]
    action: SettingsAction,
  },

  Catalog {
    #[command(subcommand)]
    action: CatalogAction,
  },

  /// Create and save a draft for a customer.
  New {
    #[arg(long)]
    customer: String,

    #[arg(long)]
    created_by: Option<String>,
  },

  /// Validate, recompute and store a quotation document.
  Save {
    #[arg(long)]
    file: PathBuf,
  },

  /// Print per-title and grand totals.
  Totals {
    #[arg(long, conflicts_with = "id", required_unless_present = "id")]
    file: Option<PathBuf>,

    #[arg(long)]
    id: Option<String>,
  },

  /// Write quotation-{number}.pdf.
  Render {
    #[arg(long)]
    id: String,

    #[arg(long, default_value = ".")]
    out: PathBuf,
  },

  /// Email the PDF and mark the quotation sent.
  Send {
    #[arg(long)]
    id: String,

    #[arg(long)]
    to: String,

    #[arg(long)]
    subject: Option<String>,

    #[arg(long)]
    body: Option<String>,
  },

  Status {
    #[arg(long)]
    id: String,

    #[arg(long = "set")]
    status: QuotationStatus,
  },

  List {
    #[arg(long)]
    customer: Option<String>,
  },

  Delete {
    #[arg(long)]
    id: String,
  },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
  Show,
  Update {
    #[arg(long)]
    file: PathBuf,
  },
}

#[derive(Subcommand, Debug)]
enum CatalogAction {
  /// Load products and customers from a JSON file.
  Import {
    #[arg(long)]
    file: PathBuf,
  },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
  #[serde(default)]
  products: Vec<Product>,
  #[serde(default)]
  customers: Vec<Customer>,
}

#[tokio::main]
async fn main() -> ExitCode {
  tracing_subscriber::registry()
    .with(tracing_subscriber::EnvFilter::new(
      std::env::var("RUST_LOG").unwrap_or_else(|_| "quotation_app=info,quotation_cli=info".into()),
    ))
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();

  match run(Cli::parse()).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      tracing::error!(error = ?err, "command failed");
      eprintln!("error: {}", user_facing(&err));
      ExitCode::FAILURE
    }
  }
}

/// Short message for the terminal; the full chain goes to the log.
fn user_facing(err: &anyhow::Error) -> String {
  match err.chain().find_map(|cause| cause.downcast_ref::<QuotationError>()) {
    Some(inner) => {
      let outer = err.to_string();
      if outer == inner.to_string() {
        inner.user_message()
      } else {
        format!("{outer}: {}", inner.user_message())
      }
    }
    None => format!("{err:#}"),
  }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
  let db_path = resolve_db_path(cli.db.as_deref())?;
  let store = Store::open(&db_path).with_context(|| format!("failed to open database {}", db_path.display()))?;
  tracing::debug!(command = ?cli.command, "dispatching");

  match cli.command {
    Command::Settings { action } => match action {
      SettingsAction::Show => {
        print_json(&store.settings().await?)?;
      }
      SettingsAction::Update { file } => {
        let patch: SettingsPatch = read_json(&file)?;
        print_json(&store.update_settings(patch).await?)?;
      }
    },

    Command::Catalog { action } => match action {
      CatalogAction::Import { file } => {
        let catalog: CatalogFile = read_json(&file)?;
        for p in &catalog.products {
          store.upsert_product(p).await?;
        }
        for c in &catalog.customers {
          store.upsert_customer(c).await?;
        }
        println!(
          "imported {} products, {} customers",
          catalog.products.len(),
          catalog.customers.len()
        );
      }
    },

    Command::New { customer, created_by } => {
      let customer = store
        .customer(&customer)
        .await?
        .with_context(|| format!("customer {customer} not found"))?;
      let settings = store.settings().await?;
      let number = store.reserve_quotation_number().await?;

      let mut q = Quotation::new(number);
      q.set_validity_days(settings.default_validity_days);
      q.currency = settings.default_currency.clone();
      q.assign_customer(&customer);
      q.created_by = created_by.unwrap_or_default();
      let title = q.add_title();
      q.add_item(&title)?;

      store.save_quotation(&mut q).await?;
      println!("{}\t{}", q.id, q.quotation_number);
    }

    Command::Save { file } => {
      let raw = std::fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
      let mut q = Quotation::from_json(&raw).with_context(|| format!("invalid quotation document {}", file.display()))?;
      store.save_quotation(&mut q).await?;
      println!("{}\t{}\t{:.2}", q.id, q.quotation_number, q.totals().grand_total);
    }

    Command::Totals { file, id } => {
      let q = match (file, id) {
        (Some(file), _) => {
          let raw = std::fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
          Quotation::from_json(&raw)?
        }
        (None, Some(id)) => load(&store, &id).await?,
        (None, None) => anyhow::bail!("either --file or --id is required"),
      };
      print_totals(&q);
    }

    Command::Render { id, out } => {
      let q = load(&store, &id).await?;
      let settings = store.settings().await?;
      let options = render_options(cli.font.as_deref())?;
      let http = reqwest::Client::new();
      let images = resolve_images(&http, &image_refs(&q, &settings)).await;
      let pdf = render_quotation(&q, &settings, &images, &options)?;
      let path = pdf.write_to(&out)?;
      println!("{}", path.display());
    }

    Command::Send { id, to, subject, body } => {
      let options = render_options(cli.font.as_deref())?;
      let http = reqwest::Client::new();
      let req = EmailRequest { to, subject, body };
      let q = send_quotation(&store, &http, &id, &req, &options).await?;
      println!("{}\t{}", q.quotation_number, q.status.as_str());
    }

    Command::Status { id, status } => {
      let q = store.set_quotation_status(&id, status).await?;
      println!("{}\t{}", q.quotation_number, q.status.as_str());
    }

    Command::List { customer } => {
      for row in store.list_quotations(customer.as_deref()).await? {
        println!(
          "{}\t{}\t{}\t{}\t{}\t{:.2}",
          row.id, row.quotation_number, row.customer_name, row.status, row.issue_date, row.total_amount
        );
      }
    }

    Command::Delete { id } => {
      if !store.delete_quotation(&id).await? {
        anyhow::bail!("quotation {id} not found");
      }
      println!("deleted {id}");
    }
  }

  Ok(())
}

async fn load(store: &Store, id: &str) -> anyhow::Result<Quotation> {
  store
    .get_quotation(id)
    .await?
    .with_context(|| format!("quotation {id} not found"))
}

fn render_options(font: Option<&Path>) -> anyhow::Result<RenderOptions> {
  let font = match font {
    Some(path) => Some(std::fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?),
    None => None,
  };
  Ok(RenderOptions {
    font,
    ..RenderOptions::default()
  })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
  let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
  serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn print_totals(q: &Quotation) {
  let mut n = 0;
  for t in q.title_totals().iter().filter(|t| t.item_count > 0) {
    n += 1;
    let name = if t.title.trim().is_empty() { "(untitled)" } else { t.title.trim() };
    println!("{n}. {name}\t{} items\t{:.2}", t.item_count, t.totals.grand_total);
  }
  let totals = q.totals();
  println!("subtotal\t{:.2}", totals.subtotal);
  println!("discount\t{:.2}", totals.total_discount);
  println!("tax\t{:.2}", totals.total_tax);
  println!("service charges\t{:.2}", totals.service_charges);
  println!("grand total\t{:.2}", totals.grand_total);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn library_errors_print_their_user_message() {
    let err = anyhow::Error::new(QuotationError::Storage {
      op: "save_quotation",
      message: "attempt to write a readonly database [ReadOnly/8]".into(),
    });
    assert_eq!(
      user_facing(&err),
      "Permission denied while saving. Check that the database is writable."
    );

    let wrapped = anyhow::Error::new(QuotationError::validation("Customer is required."))
      .context("invalid quotation document q.json");
    assert_eq!(user_facing(&wrapped), "invalid quotation document q.json: Customer is required.");
  }

  #[test]
  fn other_errors_keep_their_chain() {
    let err = anyhow::anyhow!("not a directory").context("failed to read font f.ttf");
    assert_eq!(user_facing(&err), "failed to read font f.ttf: not a directory");
  }
}
