use clap::Args;
use std::path::PathBuf;

use coursedesk::config::AppConfig;
use coursedesk::enrollment::{EnrollmentStore, FilesystemEnrollmentStore};
use coursedesk::error::AppError;

#[derive(Args, Debug)]
pub(crate) struct ListArgs {
    /// Override the configured enrollment storage directory
    #[arg(long)]
    pub(crate) storage_dir: Option<PathBuf>,
}

pub(crate) async fn run_enrollment_list(args: ListArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(dir) = args.storage_dir {
        config.storage.dir = dir;
    }

    let store = FilesystemEnrollmentStore::new(config.storage.dir.clone());
    let records = store.list().await?;

    if records.is_empty() {
        println!("No enrollments recorded yet.");
        return Ok(());
    }

    println!("{} enrollment(s) on file", records.len());
    for record in &records {
        println!(
            "- {} | {} | {} ({}) | submitted {}",
            record.id.0,
            record.full_name,
            record.selected_course,
            record.preferred_timing,
            record.submitted_at.format("%Y-%m-%d %H:%M UTC")
        );
        println!("    contact: {} / {}", record.email, record.phone);
        if let Some(motivation) = &record.motivation {
            println!("    motivation: {motivation}");
        }
    }

    Ok(())
}
