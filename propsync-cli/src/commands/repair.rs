use chrono::Local;
use clap::{Args, Subcommand};

use propsync_core::{RepairPriority, RepairRequest, RepairStatus};

use super::{confirm, parse_date, OutputFormat, Workspace};
use crate::config::Config;

#[derive(Args)]
pub struct RepairCommand {
    #[command(subcommand)]
    pub command: RepairSubcommand,
}

#[derive(Subcommand)]
pub enum RepairSubcommand {
    /// Submit a repair request
    Add {
        /// Tenant ID
        #[arg(long)]
        tenant: String,

        /// Property ID
        #[arg(long)]
        property: String,

        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Priority (low, medium, high, urgent)
        #[arg(long, default_value = "medium")]
        priority: String,

        #[arg(long, default_value = "")]
        category: String,

        /// Submission date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },

    /// List repair requests
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Update a repair request
    Update {
        /// Repair request ID
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        /// Status (submitted, in-progress, completed)
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        category: Option<String>,

        /// Resolution date (YYYY-MM-DD); marks the request completed
        #[arg(long)]
        resolved: Option<String>,

        /// Closing notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a repair request
    Delete {
        /// Repair request ID
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl RepairCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let workspace = Workspace::open(config)?;
        let store = &workspace.store;

        match &self.command {
            RepairSubcommand::Add {
                tenant,
                property,
                title,
                description,
                priority,
                category,
                date,
            } => {
                let priority: RepairPriority = priority.parse()?;
                let date = match date {
                    Some(d) => parse_date(d)?,
                    None => Local::now().date_naive(),
                };

                let request = RepairRequest::new(tenant, property, title, date)
                    .with_description(description)
                    .with_priority(priority)
                    .with_category(category);

                let created = store.add_repair_request(request)?;
                workspace.save()?;
                println!("Submitted repair request:");
                println!("{}", created);
                Ok(())
            }

            RepairSubcommand::List { format } => {
                let requests = store.list_repair_requests();
                if requests.is_empty() {
                    println!("No repair requests found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&requests)?);
                    }
                    OutputFormat::Text => {
                        for request in &requests {
                            println!(
                                "  {:36}  {}  {:11} {:7} {}",
                                request.id,
                                request.date_submitted,
                                request.status.as_str(),
                                request.priority.as_str(),
                                request.title
                            );
                        }
                        println!("\nTotal: {} repair request(s)", requests.len());
                    }
                }
                Ok(())
            }

            RepairSubcommand::Update {
                id,
                title,
                description,
                priority,
                status,
                category,
                resolved,
                notes,
            } => {
                let has_updates = title.is_some()
                    || description.is_some()
                    || priority.is_some()
                    || status.is_some()
                    || category.is_some()
                    || resolved.is_some()
                    || notes.is_some();
                if !has_updates {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let mut request = store
                    .get_repair_request(id)
                    .ok_or_else(|| format!("Repair request not found: {}", id))?;

                if let Some(t) = title {
                    request.title = t.clone();
                }
                if let Some(d) = description {
                    request.description = d.clone();
                }
                if let Some(p) = priority {
                    request.priority = p.parse()?;
                }
                if let Some(c) = category {
                    request.category = c.clone();
                }
                if let Some(s) = status {
                    request.status = s.parse::<RepairStatus>()?;
                }
                if let Some(n) = notes {
                    request.close_notes = if n.is_empty() { None } else { Some(n.clone()) };
                }
                if let Some(d) = resolved {
                    let notes = request.close_notes.take();
                    request = request.resolve(parse_date(d)?, notes);
                }

                let updated = store.update_repair_request(request)?;
                workspace.save()?;
                println!("Updated repair request:");
                println!("{}", updated);
                Ok(())
            }

            RepairSubcommand::Delete { id, force } => {
                let request = store
                    .get_repair_request(id)
                    .ok_or_else(|| format!("Repair request not found: {}", id))?;

                if !force && !confirm(&format!("Delete repair request '{}'?", request.title))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                store.delete_repair_request(id)?;
                workspace.save()?;
                println!("Deleted repair request: {}", request.title);
                Ok(())
            }
        }
    }
}
