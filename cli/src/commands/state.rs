use fitnesse_client::CoachSession;

use crate::util::{print_json, report_client_error};

pub async fn run(session: &CoachSession) -> i32 {
    match session.app_state().fetch().await {
        Ok(state) => print_json(&state),
        Err(err) => report_client_error(&err),
    }
}
