// FitPlan onboarding wizard
// Main library entry point

pub mod api;
pub mod errors;
pub mod headless;
pub mod i18n;
pub mod models;
pub mod persistence;
pub mod settings;
pub mod tui;
pub mod utils;
pub mod wizard;

use anyhow::Context;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use api::assets::{AssetSource, DirAssetSource, HttpAssetSource};
use api::orders::HttpOrderClient;
use i18n::{Localizer, Translate};
use persistence::draft::DraftStore;
use persistence::store::FileStore;
use settings::Settings;
use wizard::controller::{Collaborators, NavigationController, StepView};
use wizard::handle::WizardHandle;
use wizard::history::{HistorySynchronizer, SessionHistory};

/// Initialize logging system with dual format (JSON + human-readable)
fn init_logging(
    with_stdout: bool,
    data_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = utils::path_resolver::resolve_log_folder(data_dir)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");
    let session = uuid::Uuid::new_v4().to_string();

    // JSON log file for structured parsing
    let json_log_file = log_dir.join(format!("wizard-{}.log", timestamp));

    // Human-readable log file (.txt)
    let txt_log_file = log_dir.join(format!("wizard-{}.txt", timestamp));

    // Configure dual-format logging:
    // - JSON format to .log file
    // - Human-readable format to .txt file
    // - Optional: human-readable to stderr (disabled for TUI to avoid corrupting the terminal UI)
    let mut dispatch = fern::Dispatch::new().level(log::LevelFilter::Debug);

    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Info)
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}", txt_line));
                })
                .chain(std::io::stderr()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let json_line = utils::logging::format_json_log(
                        &timestamp_utc,
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                        Some(session.as_str()),
                    );
                    out.finish(format_args!("{}\n", json_line));
                })
                .chain(fern::log_file(json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", txt_line));
                })
                .chain(fern::log_file(txt_log_file)?),
        );

    dispatch.apply()?;

    log::info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(())
}

/// Settings plus logging; a broken settings file falls back to the defaults.
fn bootstrap(with_stdout: bool) -> Settings {
    let settings = match Settings::load() {
        Ok(s) => Some(s),
        Err(e) => {
            eprintln!("Failed to load settings, using defaults: {:#}", e);
            None
        }
    };
    let settings = settings
        .or_else(|| Settings::load_from(None, None).ok())
        .unwrap_or_else(fallback_settings);

    if let Err(e) = init_logging(with_stdout, settings.data_dir.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        "[PHASE: initialization] Wizard starting at {} (api: {}, assets: {})",
        chrono::Utc::now(),
        settings.api_base_url,
        settings
            .assets_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| settings.assets_base_url.clone())
    );
    settings
}

fn fallback_settings() -> Settings {
    Settings {
        api_base_url: "http://localhost:8000/api".to_string(),
        assets_base_url: "http://localhost:8000/".to_string(),
        assets_dir: None,
        data_dir: None,
        start_url: "http://localhost:8000/wizard.html".to_string(),
        default_lang: i18n::DEFAULT_LANG.to_string(),
        settle_delay_ms: 150,
        request_timeout_secs: 15,
    }
}

/// `?resume=true` on the page the wizard is opened with. Only the first `resume` parameter
/// counts and it must be exactly `true`.
pub fn resume_requested(page: &url::Url) -> bool {
    page.query_pairs()
        .find(|(k, _)| k == "resume")
        .is_some_and(|(_, v)| v == "true")
}

/// Wire the controller to its collaborators: assets (folder or HTTP), the draft store in the
/// data folder, the order API and the session language.
pub async fn build_wizard(
    settings: &Settings,
    view: Arc<dyn StepView>,
) -> anyhow::Result<(WizardHandle<SessionHistory>, Arc<dyn Translate>)> {
    let page = url::Url::parse(&settings.start_url)
        .with_context(|| format!("Invalid start_url {}", settings.start_url))?;

    let assets: Arc<dyn AssetSource> = match &settings.assets_dir {
        Some(dir) => Arc::new(DirAssetSource::new(dir.clone())),
        None => Arc::new(HttpAssetSource::new(
            &settings.assets_base_url,
            settings.request_timeout(),
        )?),
    };

    let data_dir: PathBuf = utils::path_resolver::resolve_data_folder(settings.data_dir.as_deref())?;
    info!(
        "[PHASE: initialization] [STEP: data_folder] Drafts stored in {:?}",
        data_dir
    );
    let drafts = DraftStore::new(Arc::new(FileStore::new(data_dir)));

    let query_lang = page
        .query_pairs()
        .find(|(k, _)| k == "lang")
        .map(|(_, v)| v.into_owned());
    let stored_lang = drafts.stored_lang().await;
    let accepted = i18n::env_languages();
    let lang = i18n::detect_lang(
        query_lang.as_deref(),
        stored_lang.as_deref(),
        accepted.iter().map(String::as_str),
        &settings.default_lang,
    );
    let translator: Arc<dyn Translate> = Arc::new(Localizer::load(assets.as_ref(), &lang).await);
    drafts.set_lang(translator.lang()).await;

    let orders = Arc::new(HttpOrderClient::new(
        &settings.api_base_url,
        settings.request_timeout(),
    )?);

    let controller = NavigationController::new(
        Collaborators {
            view,
            assets,
            drafts,
            orders,
            translator: Arc::clone(&translator),
        },
        settings.settle_delay(),
    );
    let history = SessionHistory::new(page.as_str());
    let handle = WizardHandle::new(HistorySynchronizer::new(controller, history, page));
    Ok((handle, translator))
}

/// Interactive terminal wizard
pub fn run_tui(resume: bool) {
    // Initialize logging (no stdout to avoid corrupting the TUI)
    let settings = bootstrap(false);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("[PHASE: tui] [STEP: runtime] Failed to create async runtime: {}", e);
            eprintln!("Wizard error: {}", e);
            std::process::exit(1);
        }
    };

    let (view, receiver) = tui::view_channel();
    let result = rt.block_on(async {
        let (handle, translator) = build_wizard(&settings, Arc::new(view)).await?;
        let resume = resume || resume_requested(&url::Url::parse(&settings.start_url)?);
        let restored = handle.boot(resume).await?;
        info!(
            "[PHASE: tui] [STEP: boot] Wizard booted (resume: {}, restored: {})",
            resume, restored
        );
        anyhow::Ok((handle, translator))
    });

    let result = result.and_then(|(handle, translator)| {
        let outcome = tui::run(handle.clone(), receiver, rt.handle().clone(), translator);
        tui::log_exit(&handle);
        outcome
    });

    if let Err(e) = result {
        error!("[PHASE: tui] [STEP: fatal] TUI exited with error: {:?}", e);
        eprintln!("Wizard error: {}", e);
        std::process::exit(1);
    }
}

/// Non-interactive TUI smoke mode (for automated checks).
/// Renders a single frame to an in-memory terminal, prints it and exits.
pub fn run_tui_smoke(target: Option<String>) {
    // Initialize logging (no stdout to avoid corrupting the terminal)
    let settings = bootstrap(false);

    let target = target.as_deref().unwrap_or("1");
    let translator: Arc<dyn Translate> = Arc::new(Localizer::empty(&settings.default_lang));
    match tui::smoke(target, translator) {
        Ok(screen) => print!("{}", screen),
        Err(e) => {
            error!(
                "[PHASE: tui] [STEP: smoke] TUI smoke exited with error: {:?}",
                e
            );
            eprintln!("Wizard error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Non-interactive run from a JSON answers file (for automated checks / scripted orders).
/// Exits 0 when the order was accepted, 1 otherwise.
pub fn run_headless(answers: Option<PathBuf>, resume: bool, accept_prompts: bool) {
    let settings = bootstrap(true);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    let view = Arc::new(headless::ConsoleView::new(accept_prompts));
    let result = match rt {
        Ok(rt) => rt.block_on(async {
            let answers = answers.as_deref().map(headless::read_answers).transpose()?;
            let (handle, _) = build_wizard(&settings, view.clone()).await?;
            headless::run_answers(&handle, answers, resume).await
        }),
        Err(e) => Err(anyhow::anyhow!(
            "Failed to create async runtime for headless run: {}",
            e
        )),
    };

    for line in view.transcript() {
        println!("{}", line);
    }

    match result {
        Ok(headless::RunOutcome::Submitted(wizard::controller::Submission::Accepted {
            order_id,
            redirect,
        })) => {
            info!(
                "[PHASE: headless] [STEP: done] Order {} accepted, redirect {}",
                order_id, redirect
            );
            println!("order {} -> {}", order_id, redirect);
        }
        Ok(outcome) => {
            error!("[PHASE: headless] [STEP: done] Run did not complete: {:?}", outcome);
            eprintln!("Wizard did not complete: {:?}", outcome);
            std::process::exit(1);
        }
        Err(e) => {
            error!("[PHASE: headless] [STEP: fatal] Headless run failed: {:?}", e);
            eprintln!("Wizard error: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn resume_flag_comes_from_query() {
        let page = url::Url::parse("https://fitplan.example/wizard.html?resume=true&lang=de")
            .expect("url");
        assert!(resume_requested(&page));
        for query in ["resume=0", "resume=TRUE", "resume=True", "resume=false&resume=true"] {
            let page = url::Url::parse(&format!("https://fitplan.example/wizard.html?{}", query))
                .expect("url");
            assert!(!resume_requested(&page), "{}", query);
        }
    }

    #[tokio::test]
    async fn wizard_builds_from_local_assets() {
        let assets = tempfile::tempdir().expect("assets");
        std::fs::create_dir_all(assets.path().join("i18n")).expect("mkdir");
        std::fs::write(
            assets.path().join("i18n").join("de.json"),
            r#"{"step1": {"title": "Profil"}}"#,
        )
        .expect("write");
        let data = tempfile::tempdir().expect("data");

        let mut env = HashMap::new();
        env.insert(
            "FITPLAN_WIZARD_ASSETS_DIR".to_string(),
            assets.path().display().to_string(),
        );
        env.insert(
            "FITPLAN_WIZARD_DATA_DIR".to_string(),
            data.path().display().to_string(),
        );
        env.insert(
            "FITPLAN_WIZARD_START_URL".to_string(),
            "https://fitplan.example/wizard.html?lang=de".to_string(),
        );
        let settings = Settings::load_from(None, Some(env)).expect("settings");

        let view = Arc::new(headless::ConsoleView::new(false));
        let (handle, translator) = build_wizard(&settings, view).await.expect("build");
        assert_eq!(translator.lang(), "de");
        assert_eq!(
            wizard::steps::Step::Profile.title(translator.as_ref()),
            "Profil"
        );
        let (state, _) = handle.snapshot().expect("snapshot");
        assert_eq!(state.current(), wizard::steps::Step::Profile);
    }
}
