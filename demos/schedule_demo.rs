use chrono::{Datelike, NaiveDateTime, Utc, Weekday};
use tzcron::{FilterDecision, Schedule};

fn main() {
    let expression = "0 9 * * * *";
    let timezone = "America/New_York";

    // Every morning at nine, skipping weekends
    let schedule = Schedule::builder()
        .expression(expression)
        .timezone(timezone)
        .start(Utc::now())
        .filter(|occurrence: &NaiveDateTime| match occurrence.weekday() {
            Weekday::Sat | Weekday::Sun => FilterDecision::Reject,
            _ => FilterDecision::Accept,
        })
        .build()
        .expect("Couldn't build schedule");

    println!(
        "Next matches of '{}' ({}) in {}:",
        expression,
        schedule.bundle(),
        timezone
    );

    for occurrence in schedule.take(5) {
        match occurrence {
            Ok(time) => println!("{}", time.to_rfc3339()),
            Err(err) => println!("error: {}", err),
        }
    }
}
