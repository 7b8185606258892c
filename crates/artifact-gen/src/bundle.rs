//! Customized client bundle assembly.
//!
//! A base archive is built once from a template directory. Per-user bundles
//! copy the base archive, replace the client settings file inside it with
//! generated per-user values, and drop the user's connection file alongside.

use crate::error::ArtifactError;
use crate::profile::ConnectionProfile;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

/// Path of the client settings file inside the archive.
pub const SETTINGS_PATH_IN_BUNDLE: &str = "Client/TeamTalk5.ini";

/// Build the base bundle archive from a template directory.
///
/// Fails when the template directory carries no settings file at the
/// expected path; a bundle without one is useless to end users.
pub fn build_base_bundle(template_dir: &Path, target: &Path) -> Result<(), ArtifactError> {
    if !template_dir.is_dir() {
        return Err(ArtifactError::TemplateMissing(format!(
            "{} is not a directory",
            template_dir.display()
        )));
    }
    if !settings_file_present(template_dir) {
        return Err(ArtifactError::TemplateMissing(format!(
            "no {} under {}",
            SETTINGS_PATH_IN_BUNDLE,
            template_dir.display()
        )));
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(File::create(target)?);
    add_dir_recursive(&mut writer, template_dir, template_dir)?;
    writer.finish()?;

    debug!("Base client bundle written to {}", target.display());
    Ok(())
}

fn settings_file_present(template_dir: &Path) -> bool {
    let upper = template_dir.join(SETTINGS_PATH_IN_BUNDLE);
    let lower = template_dir.join(SETTINGS_PATH_IN_BUNDLE.to_lowercase());
    upper.exists() || lower.exists()
}

fn add_dir_recursive(
    writer: &mut ZipWriter<File>,
    root: &Path,
    dir: &Path,
) -> Result<(), ArtifactError> {
    let options: FileOptions = FileOptions::default();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            add_dir_recursive(writer, root, &path)?;
        } else {
            let archive_path = path
                .strip_prefix(root)
                .map_err(|_| ArtifactError::TemplateMissing("template walk escaped root".into()))?
                .to_string_lossy()
                .replace('\\', "/");
            writer.start_file(archive_path, options)?;
            let bytes = std::fs::read(&path)?;
            writer.write_all(&bytes)?;
        }
    }
    Ok(())
}

/// Create a per-user bundle from the base archive.
///
/// The settings file is replaced with `settings_content`; the user's
/// connection file is added at the archive root under `config_filename`.
pub fn customize_bundle(
    base_bundle: &Path,
    target: &Path,
    settings_content: &str,
    config_filename: &str,
    config_content: &str,
) -> Result<(), ArtifactError> {
    let mut base = ZipArchive::new(File::open(base_bundle)?)?;
    let mut writer = ZipWriter::new(File::create(target)?);
    let options: FileOptions = FileOptions::default();

    let mut settings_replaced = false;
    for index in 0..base.len() {
        let mut entry = base.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().replace('\\', "/");

        writer.start_file(name.clone(), options)?;
        if name.to_lowercase() == SETTINGS_PATH_IN_BUNDLE.to_lowercase() {
            // Settings files ship with a BOM so the client reads them as UTF-8.
            writer.write_all("\u{feff}".as_bytes())?;
            writer.write_all(settings_content.as_bytes())?;
            settings_replaced = true;
        } else {
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            writer.write_all(&bytes)?;
        }
    }

    if !settings_replaced {
        warn!(
            "Settings file missing from base bundle, adding {}",
            SETTINGS_PATH_IN_BUNDLE
        );
        writer.start_file(SETTINGS_PATH_IN_BUNDLE, options)?;
        writer.write_all("\u{feff}".as_bytes())?;
        writer.write_all(settings_content.as_bytes())?;
    }

    writer.start_file(config_filename, options)?;
    writer.write_all(config_content.as_bytes())?;
    writer.finish()?;

    Ok(())
}

/// Generate the client settings file contents for one user.
pub fn render_client_settings(profile: &ConnectionProfile, language: &str) -> String {
    let encrypted = if profile.encrypted { "true" } else { "false" };
    format!(
        "[general_]\n\
         first-start=false\n\
         nickname={nickname}\n\
         \n\
         [display]\n\
         language={language}\n\
         \n\
         [connection]\n\
         autoconnect=true\n\
         \n\
         [serverentries]\n\
         0_name={name}\n\
         0_hostaddr={host}\n\
         0_tcpport={tcpport}\n\
         0_udpport={udpport}\n\
         0_encrypted={encrypted}\n\
         0_username={username}\n\
         0_password={password}\n\
         0_nickname={nickname}\n\
         0_channel=/\n\
         0_join-last-channel=false\n\
         0_chanpassword=\n",
        nickname = profile.nickname,
        language = language,
        name = profile.server_name,
        host = profile.host,
        tcpport = profile.tcp_port,
        udpport = profile.udp_port,
        encrypted = encrypted,
        username = profile.username,
        password = profile.password,
    )
}
