use chrono::Local;
use clap::{Args, Subcommand};

use propsync_core::Payment;

use super::{confirm, parse_date, OutputFormat, Workspace};
use crate::config::Config;

#[derive(Args)]
pub struct PaymentCommand {
    #[command(subcommand)]
    pub command: PaymentSubcommand,
}

#[derive(Subcommand)]
pub enum PaymentSubcommand {
    /// Record a payment
    Add {
        /// Property ID
        #[arg(long)]
        property: String,

        /// Tenant ID
        #[arg(long)]
        tenant: Option<String>,

        /// Amount due
        #[arg(long)]
        amount: f64,

        /// Amount paid so far
        #[arg(long, default_value_t = 0.0)]
        paid: f64,

        /// Payment date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        #[arg(long, default_value = "")]
        method: String,

        /// Month the rent is for (YYYY-MM), defaults to the payment date's month
        #[arg(long)]
        rent_month: Option<String>,
    },

    /// List payments
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Update a payment
    Update {
        /// Payment ID
        id: String,

        #[arg(long)]
        tenant: Option<String>,

        #[arg(long)]
        amount: Option<f64>,

        #[arg(long)]
        paid: Option<f64>,

        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        method: Option<String>,

        #[arg(long)]
        rent_month: Option<String>,
    },

    /// Delete a payment
    Delete {
        /// Payment ID
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl PaymentCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let workspace = Workspace::open(config)?;
        let store = &workspace.store;

        match &self.command {
            PaymentSubcommand::Add {
                property,
                tenant,
                amount,
                paid,
                date,
                method,
                rent_month,
            } => {
                let date = match date {
                    Some(d) => parse_date(d)?,
                    None => Local::now().date_naive(),
                };

                let mut payment = Payment::new(property, *amount, date)
                    .with_amount_paid(*paid)
                    .with_method(method);
                if let Some(t) = tenant {
                    payment = payment.with_tenant(t);
                }
                if let Some(m) = rent_month {
                    payment = payment.with_rent_month(m);
                }

                let created = store.add_payment(payment)?;
                workspace.save()?;
                println!("Recorded payment:");
                println!("{}", created);
                Ok(())
            }

            PaymentSubcommand::List { format } => {
                let payments = store.list_payments();
                if payments.is_empty() {
                    println!("No payments found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&payments)?);
                    }
                    OutputFormat::Text => {
                        for payment in &payments {
                            println!(
                                "  {:36}  {}  {:13} {:>10.2} / {:>10.2}",
                                payment.id,
                                payment.rent_month,
                                payment.status().as_str(),
                                payment.amount_paid,
                                payment.amount
                            );
                        }
                        let outstanding: f64 = payments.iter().map(Payment::balance).sum();
                        println!("\nTotal: {} payment(s), {:.2} outstanding", payments.len(), outstanding);
                    }
                }
                Ok(())
            }

            PaymentSubcommand::Update {
                id,
                tenant,
                amount,
                paid,
                date,
                method,
                rent_month,
            } => {
                let has_updates = tenant.is_some()
                    || amount.is_some()
                    || paid.is_some()
                    || date.is_some()
                    || method.is_some()
                    || rent_month.is_some();
                if !has_updates {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let mut payment = store
                    .get_payment(id)
                    .ok_or_else(|| format!("Payment not found: {}", id))?;

                if let Some(t) = tenant {
                    payment.tenant_id = if t.is_empty() { None } else { Some(t.clone()) };
                }
                if let Some(a) = amount {
                    payment.amount = *a;
                }
                if let Some(p) = paid {
                    payment.amount_paid = *p;
                }
                if let Some(d) = date {
                    payment.date = parse_date(d)?;
                }
                if let Some(m) = method {
                    payment.method = m.clone();
                }
                if let Some(m) = rent_month {
                    payment.rent_month = m.clone();
                }

                // The store recomputes the status.
                let updated = store.update_payment(payment)?;
                workspace.save()?;
                println!("Updated payment:");
                println!("{}", updated);
                Ok(())
            }

            PaymentSubcommand::Delete { id, force } => {
                let payment = store
                    .get_payment(id)
                    .ok_or_else(|| format!("Payment not found: {}", id))?;

                let prompt = format!(
                    "Delete payment of {:.2} for {}?",
                    payment.amount, payment.rent_month
                );
                if !force && !confirm(&prompt)? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                store.delete_payment(id)?;
                workspace.save()?;
                println!("Deleted payment: {}", payment.id);
                Ok(())
            }
        }
    }
}
