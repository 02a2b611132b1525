use std::path::PathBuf;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Non-interactive TUI smoke test mode (for automated checks).
    // Renders a single frame for a specific step, prints it and exits 0.
    // Usage: --tui-smoke or --tui-smoke=1..8|profile|goal|sport|balance|diet|menu_settings|plan|review
    if let Some(arg) = args
        .iter()
        .find(|a| a.as_str() == "--tui-smoke" || a.starts_with("--tui-smoke="))
    {
        let target = arg
            .split_once('=')
            .map(|(_, v)| v.to_string())
            .filter(|v| !v.trim().is_empty());
        fitplan_wizard::run_tui_smoke(target);
        return;
    }

    let resume = args.iter().any(|a| a == "--resume");

    // Scripted run: --run [--answers <file.json>] [--resume] [--yes]
    // Presses "Next" through every step and submits the order; exits 0 only when it was accepted.
    // --yes accepts confirmation prompts (e.g. dropping premium choices on a standard plan).
    if args.iter().any(|a| a == "--run") {
        let answers = args
            .iter()
            .position(|a| a == "--answers")
            .and_then(|i| args.get(i + 1))
            .map(PathBuf::from);
        let accept_prompts = args.iter().any(|a| a == "--yes");
        fitplan_wizard::run_headless(answers, resume, accept_prompts);
        return;
    }

    fitplan_wizard::run_tui(resume);
}
