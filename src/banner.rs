//! Startup banner and run summary display.

use crate::backend::Credits;
use crate::consts::{AUTHOR, VERSION};
use crate::label::LabelTable;
use crate::team::{Mode, TeamId, resolve};

/// Session configuration for display in the startup banner.
pub struct BannerInfo<'a> {
    pub mode: Mode,
    pub teams: &'a [TeamId],
    pub auth_status: &'a str,
    pub base_url: &'a str,
    pub credits: Option<Credits>,
}

/// Labels of the models each team will call, e.g. `Team 1: DEEPSEEK R1`.
pub fn team_lines(teams: &[TeamId], mode: Mode) -> Vec<String> {
    let labels = LabelTable::default();
    teams
        .iter()
        .map(|team| {
            let models: Vec<String> = resolve(*team, mode)
                .iter()
                .map(|m| labels.label(m))
                .collect();
            format!("{team}: {}", models.join(", "))
        })
        .collect()
}

pub fn credits_line(credits: Option<Credits>) -> String {
    match credits {
        Some(c) => format!("{:.2} / {:.2} used", c.used, c.total),
        None => "unknown".to_string(),
    }
}

pub fn print_banner(info: &BannerInfo) {
    println!(
        r#"
   ╔═══════════════════════════════════════╗
   ║            D E V T E A M              ║
   ║     one prompt, many minds at once    ║
   ╚═══════════════════════════════════════╝

   version   {}
   by        {}
   mode      {}
   api       {}
   auth      {}
   credits   {}"#,
        VERSION,
        AUTHOR,
        info.mode,
        info.base_url,
        info.auth_status,
        credits_line(info.credits),
    );
    for line in team_lines(info.teams, info.mode) {
        println!("   {line}");
    }
    println!();
}

/// One line per run: how many responses, how many failed or timed out.
pub fn print_run_summary(total: usize, timed_out: usize, failed: usize, credits: Credits) {
    println!(
        "run: {total} response(s), {timed_out} timed out, {failed} failed; credits {}",
        credits_line(Some(credits))
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_lines_use_labels() {
        let lines = team_lines(&[TeamId::One, TeamId::Three], Mode::Options);
        assert_eq!(lines, vec!["Team 1: DEEPSEEK R1", "Team 3: GROK-4"]);
    }

    #[test]
    fn team_lines_max_lists_all_models() {
        let lines = team_lines(&[TeamId::Two], Mode::Max);
        assert_eq!(
            lines[0],
            "Team 2: GEMINI-2.5-PRO, DEEPSEEK R1, CLAUDE-OPUS-4, GROK-4"
        );
    }

    #[test]
    fn credits_line_formats() {
        assert_eq!(credits_line(None), "unknown");
        assert_eq!(
            credits_line(Some(Credits {
                used: 1.5,
                total: 10.0
            })),
            "1.50 / 10.00 used"
        );
    }

    #[test]
    fn print_banner_does_not_panic() {
        print_banner(&BannerInfo {
            mode: Mode::Pro,
            teams: &TeamId::ALL,
            auth_status: "API key ✓",
            base_url: "https://openrouter.ai/api/v1",
            credits: None,
        });
    }

    #[test]
    fn print_run_summary_does_not_panic() {
        print_run_summary(3, 1, 0, Credits::default());
    }
}
