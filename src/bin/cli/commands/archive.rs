use chrono::{NaiveDate, Utc};
use mizuki::context::{Error, UserContext};
use mizuki::stats::archive::archive_linked_players;

#[derive(clap::Args)]
pub struct Args {
	/// Day to file the archive under (YYYY-MM-DD). Defaults to today, in UTC.
	#[arg(long)]
	date: Option<NaiveDate>,
}

pub async fn run(args: Args) -> Result<(), Error> {
	let ctx = UserContext::new()?;
	let date = args.date.unwrap_or_else(|| Utc::now().date_naive());

	let report = archive_linked_players(&ctx, date)
		.await
		.map_err(|e| e.error)?;

	println!(
		"Archived {} snapshots of {} players on {date} ({} skipped)",
		report.snapshots, report.players, report.skipped
	);

	Ok(())
}
