use stowage::loader::{
    AssetConsumer, AssetKind, AssetLocation, AssetManager, BufferContent, Language,
    LanguageSelection, LoadedAsset, LoaderConfig, RequestDesc, RequestHandle, RequestSource,
};
use std::path::PathBuf;
use std::time::Duration;

pub fn demo_data_path() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/data"))
}

// Stands in for a UI label that displays whatever text it is given
struct Label {
    name: &'static str,
}

impl AssetConsumer for Label {
    fn apply_asset(
        &mut self,
        asset: Option<&LoadedAsset>,
    ) {
        match asset.and_then(|asset| asset.text()) {
            Some(text) => println!("[{}] {}", self.name, text.trim_end()),
            None => println!("[{}] <nothing>", self.name),
        }
    }

    fn on_loaded(
        &mut self,
        success: bool,
    ) {
        log::info!("{} finished loading, success: {}", self.name, success);
    }
}

// Stands in for an image widget
struct Picture;

impl AssetConsumer for Picture {
    fn apply_asset(
        &mut self,
        asset: Option<&LoadedAsset>,
    ) {
        match asset.and_then(|asset| asset.texture()) {
            Some(texture) => println!("[picture] {}x{}", texture.width, texture.height),
            None => println!("[picture] <nothing>"),
        }
    }

    fn on_loading(
        &mut self,
        progress: f32,
    ) {
        log::debug!("picture {:.0}%", progress * 100.0);
    }
}

fn main() {
    // Setup logging
    env_logger::Builder::default()
        .write_style(env_logger::WriteStyle::Always)
        .filter_level(log::LevelFilter::Debug)
        .init();

    let data_path = demo_data_path();
    let mut config = match LoaderConfig::from_json_file(&data_path.join("loader_config.json")) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Using default loader config: {}", e);
            LoaderConfig::default()
        }
    };
    config.roots.install_root = data_path.clone();
    config.roots.bundled_root = data_path.clone();

    let mut manager = match AssetManager::new(config) {
        Ok(manager) => manager,
        Err(e) => {
            log::error!("Could not start the asset manager: {}", e);
            return;
        }
    };

    // Localized copies would normally ship as a folder per language
    match manager.resources_mut().insert_directory(&data_path) {
        Ok(count) => log::info!("Registered {} resources", count),
        Err(e) => log::warn!("Could not register resources: {}", e),
    }
    manager
        .resources_mut()
        .insert("English/greeting.txt", b"Hello".to_vec());
    manager
        .resources_mut()
        .insert("Japanese/greeting.txt", "こんにちは".as_bytes().to_vec());

    let text_kind = AssetKind::TextBuffer(BufferContent::Text);
    let mut handles: Vec<RequestHandle> = Vec::default();

    let file_greeting = manager.create_request(
        RequestDesc::new(
            RequestSource::location(AssetLocation::PathOrUrl, "greeting.txt"),
            text_kind,
        )
        .with_load_on_enable(false),
        Box::new(Label { name: "file" }),
    );
    manager.load_and_apply(&file_greeting);
    handles.push(file_greeting);

    for (name, language) in [
        ("system", LanguageSelection::System),
        ("japanese", LanguageSelection::Explicit(Language::Japanese)),
    ] {
        let handle = manager.create_request(
            RequestDesc::new(RequestSource::resource("greeting.txt", Some(language)), text_kind)
                .with_load_on_enable(false),
            Box::new(Label { name }),
        );
        manager.load_and_apply(&handle);
        handles.push(handle);
    }

    // Pass an image URL to fetch it over HTTP as well
    if let Some(url) = std::env::args().nth(1) {
        let picture = manager.create_request(
            RequestDesc::new(
                RequestSource::location(AssetLocation::PathOrUrl, url),
                AssetKind::Texture,
            )
            .with_timeout(Duration::from_secs(15))
            .with_load_on_enable(false),
            Box::new(Picture),
        );
        manager.load_and_apply(&picture);
        handles.push(picture);
    }

    while handles.iter().any(|handle| manager.is_loading(handle)) {
        profiling::scope!("frame");
        std::thread::sleep(Duration::from_millis(15));
        manager.update();
    }

    for handle in &handles {
        if let Some(e) = manager.last_error(handle) {
            let source = manager
                .loader()
                .get_load_info(handle.load_handle())
                .map(|info| info.source);
            log::warn!("{:?} failed: {} ({:?})", handle.load_handle(), e, source);
        }
    }

    // Dropping the handles releases everything on the next update
    handles.clear();
    manager.update();
    log::info!(
        "{} requests left after shutdown",
        manager.loader().active_requests().len()
    );
}
