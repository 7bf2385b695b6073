use campusdesk_models::event::EventPurpose;
use campusdesk_models::role::Role;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "campusdesk")]
#[command(about = "Campus event bookings, maintenance issues and green points")]
pub struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "campusdesk.toml")]
    pub config: PathBuf,

    /// Acting user id, as asserted by the identity provider
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Acting user's role
    #[arg(long, global = true)]
    pub role: Option<Role>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending schema migrations and exit
    Migrate,
    /// Provision a user record
    AddUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long = "as")]
        new_role: Role,
    },
    /// Submit a venue booking (students)
    CreateEvent {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        /// HH:MM or HH:MM:SS
        #[arg(long, value_parser = parse_time)]
        start: NaiveTime,
        #[arg(long, value_parser = parse_time)]
        end: NaiveTime,
        #[arg(long)]
        participants: u32,
        #[arg(long)]
        purpose: EventPurpose,
    },
    /// Report a maintenance issue (students)
    CreateIssue {
        #[arg(long = "type")]
        issue_type: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Approve or reject a pending event (faculty, admin)
    SetEventStatus { event_id: String, status: String },
    /// Mark an issue resolved (maintenance)
    SetIssueStatus { issue_id: String, status: String },
    /// Credit green points for an issue (faculty, admin)
    AwardPoints {
        issue_id: String,
        #[arg(allow_negative_numbers = true)]
        points: i64,
    },
    /// Dashboard counters for a student, or campus-wide with --all
    Totals {
        #[arg(long, conflicts_with = "all")]
        student: Option<String>,
        #[arg(long)]
        all: bool,
    },
    /// List events for a student, or every event with --all
    Events {
        #[arg(long, conflicts_with = "all")]
        student: Option<String>,
        #[arg(long)]
        all: bool,
    },
    /// List issues for a student, or every issue with --all
    Issues {
        #[arg(long, conflicts_with = "all")]
        student: Option<String>,
        #[arg(long)]
        all: bool,
    },
    /// Approved events from today onwards
    Upcoming,
    /// Current green point balance
    Points {
        #[arg(long)]
        student: Option<String>,
    },
    /// Green point ledger, newest first
    History {
        #[arg(long)]
        student: Option<String>,
    },
    /// Display name for a user id
    Name { user_id: String },
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| format!("invalid time {raw:?}, expected HH:MM or HH:MM:SS"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn times_accept_both_forms() {
        assert_eq!(parse_time("09:30").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(
            parse_time("17:05:30").unwrap(),
            NaiveTime::from_hms_opt(17, 5, 30).unwrap()
        );
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("noon").is_err());
    }

    #[test]
    fn award_parses_identity_and_amount() {
        let args = Args::try_parse_from([
            "campusdesk",
            "--user",
            "f1",
            "--role",
            "faculty",
            "award-points",
            "i1",
            "10",
        ])
        .unwrap();
        assert_eq!(args.role, Some(Role::Faculty));
        assert!(matches!(
            args.command,
            Command::AwardPoints { ref issue_id, points: 10 } if issue_id == "i1"
        ));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(Args::try_parse_from(["campusdesk", "--role", "janitor", "upcoming"]).is_err());
    }
}
