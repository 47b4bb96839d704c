use chrono::NaiveDate;
use clap::Subcommand;
use fitnesse_client::CoachSession;
use fitnesse_core::plans::{PLAN_DURATION_DAYS_DEFAULT, PlanKind};
use fitnesse_core::state::PlanDomain;

use crate::util::{print_json, report_plan_error};

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Generate a new meal or workout plan
    Generate {
        /// Plan kind (meal or workout)
        kind: PlanKind,
        /// Plan length in days (7-90)
        #[arg(long, default_value_t = PLAN_DURATION_DAYS_DEFAULT)]
        days: u32,
    },
    /// Show one day of a plan
    View {
        /// Plan ID
        plan_id: String,
        /// Day to show (YYYY-MM-DD). Defaults to today on the server.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Include full recipes and exercise details
        #[arg(long)]
        detail: bool,
    },
    /// Show today's entry of the active nutrition or training plan
    Today {
        /// Domain (nutrition or training)
        domain: PlanDomain,
        /// Include full recipes and exercise details
        #[arg(long)]
        detail: bool,
    },
}

pub async fn run(session: &CoachSession, command: PlanCommands) -> i32 {
    let plans = session.plans();
    let result = match command {
        PlanCommands::Generate { kind, days } => plans
            .generate(kind, days)
            .await
            .map(|summary| print_json(&summary)),
        PlanCommands::View {
            plan_id,
            date,
            detail,
        } => plans
            .view(&plan_id, date, detail)
            .await
            .map(|view| print_json(&view)),
        PlanCommands::Today { domain, detail } => plans
            .today(domain, detail)
            .await
            .map(|view| print_json(&view)),
    };
    result.unwrap_or_else(|err| report_plan_error(&err))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use clap::Parser;
    use fitnesse_core::plans::PlanKind;
    use fitnesse_core::state::PlanDomain;

    use super::PlanCommands;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: PlanCommands,
    }

    fn parse(args: &[&str]) -> Result<PlanCommands, clap::Error> {
        TestCli::try_parse_from(std::iter::once("plan").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn generate_defaults_to_thirty_days() {
        let Ok(PlanCommands::Generate { kind, days }) = parse(&["generate", "meal"]) else {
            panic!("expected generate");
        };
        assert_eq!(kind, PlanKind::Meal);
        assert_eq!(days, 30);
    }

    #[test]
    fn view_parses_date() {
        let Ok(PlanCommands::View { plan_id, date, detail }) =
            parse(&["view", "plan-1", "--date", "2025-01-06", "--detail"])
        else {
            panic!("expected view");
        };
        assert_eq!(plan_id, "plan-1");
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 1, 6));
        assert!(detail);
        assert!(parse(&["view", "plan-1", "--date", "next week"]).is_err());
    }

    #[test]
    fn today_takes_a_domain() {
        let Ok(PlanCommands::Today { domain, .. }) = parse(&["today", "training"]) else {
            panic!("expected today");
        };
        assert_eq!(domain, PlanDomain::Training);
        assert!(parse(&["today", "sleep"]).is_err());
    }
}
