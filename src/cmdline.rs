// SPDX-License-Identifier: MIT

//! Launch command line virtualization.
//!
//! Takes the JVM command line the launcher produced and rewrites it so every
//! path the game touches resolves inside the mounted sandbox root.  The
//! rewrite runs twice over the arguments: once for the direct flags, which
//! builds the classpath mapping, and once more to translate properties that
//! name classpath entries by their original location.

pub mod classpath;
pub mod quote;

use tracing::{debug, warn};

pub use classpath::{ClasspathMapping, ClasspathStager};

use crate::fs::FilePath;
use crate::runtime::error::{Result, SandboxError};

pub const ENTRY_POINT: &str = "net.fabricmc.sandbox.Main";
pub const RUNTIME_ENTRY_POINT: &str = "net.fabricmc.sandbox.runtime.Main";

/// Properties that point the JVM and its libraries at native code.
pub const NATIVE_PATH_PROPERTIES: [&str; 4] = [
    "java.library.path",
    "jna.tmpdir",
    "org.lwjgl.system.SharedLibraryExtractPath",
    "io.netty.native.workdir",
];

pub const TEMP_DIR_PROPERTY: &str = "java.io.tmpdir";
pub const NAMED_PIPE_PROPERTY: &str = "sandbox.namedPipe";
pub const DEVELOPMENT_PROPERTY: &str = "fabric.development";
pub const REMAP_CLASSPATH_PROPERTY: &str = "fabric.remapClasspathFile";
pub const LOG_CONFIG_PROPERTY: &str = "log4j.configurationFile";

/// `;` separated lists of jars.
const GAME_JAR_PROPERTIES: [&str; 3] = [
    "fabric.gameJarPath",
    "fabric.gameJarPath.client",
    "fabric.gameJarPath.server",
];

/// `;;` separated groups of `;` separated jars.
const CLASSPATH_GROUPS_PROPERTY: &str = "fabric.classPathGroups";

pub const TEMP_DIR: &str = "temp";
pub const NATIVES_DIR: &str = "temp\\bin";
pub const ASSETS_DIR: &str = "assets";
const SANDBOX_VERSION_TYPE: &str = "Sandbox";

/// Where the rewritten command line should point.
#[derive(Debug, Clone)]
pub struct RewriteOptions<'a> {
    /// The real game data directory.
    pub data_dir: &'a FilePath,
    /// The same directory as seen through the mount.
    pub sandbox_root: &'a FilePath,
    /// Broker endpoint handed to the sandboxed process.
    pub pipe_path: &'a str,
    /// Added next to the generated JVM properties.
    pub extra_jvm_args: &'a [String],
}

#[derive(Debug, Clone)]
pub struct RewrittenCommandLine {
    pub args: Vec<String>,
    pub classpath: ClasspathMapping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxCommandLine {
    args: Vec<String>,
}

impl SandboxCommandLine {
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }

    /// Build from raw arguments, expanding `@file` arguments.
    pub fn from_args(args: Vec<String>) -> Result<Self> {
        Ok(Self { args: expand_arg_files(args)? })
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The launched executable, with links followed and bare names found on `PATH`.
    pub fn application_path(&self) -> Result<FilePath> {
        let first = self
            .args
            .first()
            .ok_or_else(|| SandboxError::Configuration("empty command line".to_string()))?;
        let mut path = FilePath::new(first);
        if !path.is_absolute() {
            let found = which::which(first)
                .map_err(|e| SandboxError::Configuration(format!("cannot find {first}: {e}")))?;
            path = FilePath::from_path(&found);
        }
        path.resolve_link()
    }

    /// The runtime install directory, two levels above the executable.
    pub fn java_home(&self) -> Result<FilePath> {
        let app = self.application_path()?;
        app.parent()
            .and_then(|bin| bin.parent())
            .ok_or_else(|| SandboxError::Configuration(format!("cannot find the java home of {app}")))
    }

    /// Value of a `-Dname=value` property.  A bare `-Dname` has an empty value.
    pub fn jvm_prop(&self, name: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| property_value(arg, name))
    }

    pub fn is_dev_env(&self) -> bool {
        self.jvm_prop(DEVELOPMENT_PROPERTY) == Some("true")
    }

    /// Value following a `--flag value` pair.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        let idx = self.args.iter().position(|a| a == flag)?;
        self.args.get(idx + 1).map(String::as_str)
    }

    pub fn assets_dir(&self) -> Option<FilePath> {
        self.flag_value("--assetsDir").map(FilePath::new)
    }

    pub fn log_config(&self) -> Option<FilePath> {
        self.jvm_prop(LOG_CONFIG_PROPERTY).filter(|v| !v.is_empty()).map(FilePath::new)
    }

    /// Produce the command line to run inside the sandbox.
    pub fn rewrite(&self, options: &RewriteOptions<'_>) -> Result<RewrittenCommandLine> {
        let mut stager = ClasspathStager::new(options.data_dir, options.sandbox_root)?;
        let dev = self.is_dev_env();
        let temp_dir = options.sandbox_root.child(TEMP_DIR);
        let mut out: Vec<String> = Vec::with_capacity(self.args.len() + 8);
        let mut saw_version_type = false;

        let mut args = self.args.iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                ENTRY_POINT => out.push(RUNTIME_ENTRY_POINT.to_string()),
                "-cp" | "-classpath" => {
                    out.push(arg.clone());
                    if let Some(cp) = next_value(&mut args, arg) {
                        out.push(stager.rewrite_classpath(cp)?);
                    }
                }
                "--versionType" => {
                    saw_version_type = true;
                    out.push(arg.clone());
                    if let Some(v) = next_value(&mut args, arg) {
                        out.push(sandbox_version_type(v));
                    }
                }
                "--gameDir" => {
                    out.push(arg.clone());
                    if next_value(&mut args, arg).is_some() {
                        out.push(options.sandbox_root.to_string());
                    }
                }
                "--assetsDir" => {
                    out.push(arg.clone());
                    if let Some(v) = next_value(&mut args, arg) {
                        if dev {
                            out.push(v.to_string());
                        } else {
                            out.push(options.sandbox_root.child(ASSETS_DIR).to_string());
                        }
                    }
                }
                a if a.starts_with("-javaagent") => {
                    debug!(arg = a, "removing java agent");
                }
                a if a.starts_with("-D") => out.push(self.rewrite_property(a, options, &temp_dir, &mut stager)?),
                _ => out.push(arg.clone()),
            }
        }

        if !saw_version_type {
            out.push("--versionType".to_string());
            out.push(SANDBOX_VERSION_TYPE.to_string());
        }

        insert_jvm_args(&mut out, options, &temp_dir);

        let classpath = stager.into_mapping();
        let args = out.into_iter().map(|a| translate_indirect(a, &classpath)).collect();
        Ok(RewrittenCommandLine { args, classpath })
    }

    fn rewrite_property(
        &self,
        arg: &str,
        options: &RewriteOptions<'_>,
        temp_dir: &FilePath,
        stager: &mut ClasspathStager<'_>,
    ) -> Result<String> {
        let Some((key, value)) = arg[2..].split_once('=') else {
            return Ok(arg.to_string());
        };
        if key == TEMP_DIR_PROPERTY {
            return Ok(property(key, &temp_dir.to_string()));
        }
        if key == REMAP_CLASSPATH_PROPERTY {
            return Ok(property(key, &stager.rewrite_remap_file(value)?));
        }
        if NATIVE_PATH_PROPERTIES.contains(&key) {
            let rewritten: Vec<String> = value
                .split(';')
                .map(|entry| match FilePath::new(entry).rebase(options.data_dir, options.sandbox_root) {
                    Some(moved) if !entry.is_empty() => moved.to_string(),
                    _ => entry.to_string(),
                })
                .collect();
            return Ok(property(key, &rewritten.join(";")));
        }
        Ok(arg.to_string())
    }
}

/// Insert the generated properties in front of the first existing one.
fn insert_jvm_args(out: &mut Vec<String>, options: &RewriteOptions<'_>, temp_dir: &FilePath) {
    let Some(idx) = out.iter().position(|a| a.starts_with("-D")) else {
        warn!("no JVM properties on the command line; sandbox properties were not added");
        return;
    };
    let present = |name: &str| out.iter().any(|a| property_value(a, name).is_some());

    let mut added = vec![];
    if !present(TEMP_DIR_PROPERTY) {
        added.push(property(TEMP_DIR_PROPERTY, &temp_dir.to_string()));
    }
    let natives = options.sandbox_root.child(NATIVES_DIR).to_string();
    for name in NATIVE_PATH_PROPERTIES {
        if !present(name) {
            added.push(property(name, &natives));
        }
    }
    added.push(property(NAMED_PIPE_PROPERTY, options.pipe_path));
    added.extend(options.extra_jvm_args.iter().cloned());
    out.splice(idx..idx, added);
}

fn translate_indirect(arg: String, mapping: &ClasspathMapping) -> String {
    if let Some(value) = property_value(&arg, CLASSPATH_GROUPS_PROPERTY) {
        let groups: Vec<String> = value
            .split(";;")
            .map(|group| group.split(';').map(|e| mapping.translate(e)).collect::<Vec<_>>().join(";"))
            .collect();
        return property(CLASSPATH_GROUPS_PROPERTY, &groups.join(";;"));
    }
    for name in GAME_JAR_PROPERTIES {
        if let Some(value) = property_value(&arg, name) {
            let jars: Vec<String> = value.split(';').map(|e| mapping.translate(e)).collect();
            return property(name, &jars.join(";"));
        }
    }
    arg
}

fn next_value<'a>(args: &mut impl Iterator<Item = &'a String>, flag: &str) -> Option<&'a str> {
    let value = args.next().map(String::as_str);
    if value.is_none() {
        warn!(flag, "flag is missing its value");
    }
    value
}

fn sandbox_version_type(value: &str) -> String {
    if value == "release" {
        SANDBOX_VERSION_TYPE.to_string()
    } else {
        format!("{value}/{SANDBOX_VERSION_TYPE}")
    }
}

fn property(name: &str, value: &str) -> String {
    format!("-D{name}={value}")
}

fn property_value<'a>(arg: &'a str, name: &str) -> Option<&'a str> {
    let rest = arg.strip_prefix("-D")?.strip_prefix(name)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('=')
    }
}

/// Replace `@file` arguments (after the executable) with the lines of the file.
pub fn expand_arg_files(args: Vec<String>) -> Result<Vec<String>> {
    let mut ret = Vec::with_capacity(args.len());
    for (idx, arg) in args.into_iter().enumerate() {
        match arg.strip_prefix('@') {
            Some(file) if idx > 0 => {
                let contents = FilePath::new(file).read_string()?;
                ret.extend(contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from));
            }
            _ => ret.push(arg),
        }
    }
    Ok(ret)
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::*;
    use crate::runtime::context::tests::capturing_context;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn rewrite(args: &[&str], data: &FilePath, root: &FilePath) -> RewrittenCommandLine {
        let cmd = SandboxCommandLine::new(strings(args));
        cmd.rewrite(&RewriteOptions {
            data_dir: data,
            sandbox_root: root,
            pipe_path: r"\\.\pipe\FabricSandboxtest",
            extra_jvm_args: &[],
        })
        .unwrap()
    }

    #[test]
    fn relocates_game_into_the_mount() {
        let data = FilePath::new("C:\\mc");
        let root = FilePath::new("S:");
        let out = rewrite(
            &["java.exe", "-cp", "C:\\mc\\bin\\x.jar", ENTRY_POINT, "--gameDir", "C:\\mc"],
            &data,
            &root,
        );
        assert_eq!(
            out.args,
            strings(&[
                "java.exe",
                "-cp",
                &FilePath::new("S:\\bin\\x.jar").to_string(),
                RUNTIME_ENTRY_POINT,
                "--gameDir",
                &root.to_string(),
                "--versionType",
                "Sandbox",
            ]),
        );
        assert_eq!(
            out.classpath.get(&FilePath::new("C:\\mc\\bin\\x.jar")),
            Some(&FilePath::new("S:\\bin\\x.jar")),
        );
    }

    #[test]
    fn unrelated_flags_keep_their_order() {
        let data = FilePath::new("C:\\mc");
        let root = FilePath::new("S:");
        let out = rewrite(&["java.exe", "-Xmx2G", "-XX:+UseG1GC", "Main", "--username", "dev"], &data, &root);
        assert_eq!(
            out.args,
            strings(&["java.exe", "-Xmx2G", "-XX:+UseG1GC", "Main", "--username", "dev", "--versionType", "Sandbox"]),
        );
    }

    #[test]
    fn version_type_is_marked() {
        let data = FilePath::new("C:\\mc");
        let root = FilePath::new("S:");
        let out = rewrite(&["java.exe", "--versionType", "release"], &data, &root);
        assert_eq!(out.args, strings(&["java.exe", "--versionType", "Sandbox"]));
        let out = rewrite(&["java.exe", "--versionType", "Fabric"], &data, &root);
        assert_eq!(out.args, strings(&["java.exe", "--versionType", "Fabric/Sandbox"]));
    }

    #[test]
    fn assets_dir_moves_unless_in_development() {
        let data = FilePath::new("C:\\mc");
        let root = FilePath::new("S:");
        let out = rewrite(&["java.exe", "--assetsDir", "C:\\mc\\assets"], &data, &root);
        assert_eq!(out.args[2], root.child("assets").to_string());

        let out = rewrite(
            &["java.exe", "-Dfabric.development=true", "--assetsDir", "C:\\gradle\\assets"],
            &data,
            &root,
        );
        let idx = out.args.iter().position(|a| a == "--assetsDir").unwrap();
        assert_eq!(out.args[idx + 1], "C:\\gradle\\assets");
    }

    #[test]
    fn jvm_properties_are_inserted_before_the_first_property() {
        let data = FilePath::new("C:\\mc");
        let root = FilePath::new("S:");
        let cmd = SandboxCommandLine::new(strings(&[
            "java.exe",
            "-Xss1M",
            "-Djna.tmpdir=C:\\mc\\natives",
            "-Dother=1",
            "Main",
        ]));
        let extra = vec!["-Dsandbox.extra=yes".to_string()];
        let out = cmd
            .rewrite(&RewriteOptions {
                data_dir: &data,
                sandbox_root: &root,
                pipe_path: r"\\.\pipe\FabricSandboxabc",
                extra_jvm_args: &extra,
            })
            .unwrap()
            .args;

        let natives = root.child(NATIVES_DIR).to_string();
        let expected = strings(&[
            "java.exe",
            "-Xss1M",
            &format!("-Djava.io.tmpdir={}", root.child(TEMP_DIR)),
            &format!("-Djava.library.path={natives}"),
            &format!("-Dorg.lwjgl.system.SharedLibraryExtractPath={natives}"),
            &format!("-Dio.netty.native.workdir={natives}"),
            r"-Dsandbox.namedPipe=\\.\pipe\FabricSandboxabc",
            "-Dsandbox.extra=yes",
            &format!("-Djna.tmpdir={}", root.child("natives")),
            "-Dother=1",
            "Main",
            "--versionType",
            "Sandbox",
        ]);
        assert_eq!(out, expected);
    }

    #[test]
    fn temp_dir_property_is_forced_into_the_mount() {
        let data = FilePath::new("C:\\mc");
        let root = FilePath::new("S:");
        let out = rewrite(&["java.exe", "-Djava.io.tmpdir=C:\\Users\\me\\Temp"], &data, &root);
        let tmp: Vec<&String> = out.args.iter().filter(|a| a.starts_with("-Djava.io.tmpdir=")).collect();
        assert_eq!(tmp, vec![&format!("-Djava.io.tmpdir={}", root.child(TEMP_DIR))]);
    }

    #[test]
    fn no_properties_means_nothing_inserted() {
        let data = FilePath::new("C:\\mc");
        let root = FilePath::new("S:");
        let out = rewrite(&["java.exe", "Main"], &data, &root);
        assert!(!out.args.iter().any(|a| a.starts_with("-D")));
    }

    #[test]
    fn java_agents_are_stripped() {
        let data = FilePath::new("C:\\mc");
        let root = FilePath::new("S:");
        let out = rewrite(&["java.exe", "-javaagent:C:\\agent.jar=opts", "Main"], &data, &root);
        assert!(!out.args.iter().any(|a| a.contains("javaagent")));
    }

    #[test]
    fn indirect_properties_follow_the_classpath() {
        let tmp = tempfile::tempdir().unwrap();
        let base = FilePath::from_path(tmp.path());
        let data = base.child("mc");
        let root = base.child("mount");
        data.create_dir_all().unwrap();
        root.create_dir_all().unwrap();
        let game = base.child("cache\\minecraft.jar");
        let lib = base.child("cache\\lib.jar");
        game.parent().unwrap().create_dir_all().unwrap();
        game.write_string("game").unwrap();
        lib.write_string("lib").unwrap();
        let stray = base.child("cache\\stray.jar");
        stray.write_string("stray").unwrap();

        let cp = format!("{game};{lib}");
        let game_prop = format!("-Dfabric.gameJarPath.client={game}");
        let groups = format!("-Dfabric.classPathGroups={game};{lib};;{stray}");
        let out = rewrite(&["java.exe", &game_prop, &groups, "-cp", &cp, "Main"], &data, &root);

        let staged_game = root.child(classpath::CLASSPATH_DIR).child("minecraft.jar");
        let staged_lib = root.child(classpath::CLASSPATH_DIR).child("lib.jar");
        assert!(out.args.contains(&format!("-Dfabric.gameJarPath.client={staged_game}")));
        assert!(out.args.contains(&format!("-Dfabric.classPathGroups={staged_game};{staged_lib};;{stray}")));
        assert!(out.args.contains(&format!("{staged_game};{staged_lib}")));
    }

    #[test]
    fn remap_file_after_classpath_keeps_game_jar_on_classpath() {
        let tmp = tempfile::tempdir().unwrap();
        let base = FilePath::from_path(tmp.path());
        let data = base.child("mc");
        let root = base.child("mount");
        data.create_dir_all().unwrap();
        root.create_dir_all().unwrap();
        let game = base.child("cache\\minecraft.jar");
        game.parent().unwrap().create_dir_all().unwrap();
        game.write_string("game").unwrap();
        let remap = base.child("remap.txt");
        remap.write_string(&game.to_string()).unwrap();

        let remap_prop = format!("-Dfabric.remapClasspathFile={remap}");
        let game_prop = format!("-Dfabric.gameJarPath={game}");
        let game_arg = game.to_string();
        let out = rewrite(&["java.exe", "-cp", &game_arg, &remap_prop, &game_prop, "Main"], &data, &root);

        let staged_game = root.child(classpath::CLASSPATH_DIR).child("minecraft.jar");
        assert_eq!(out.args[2], staged_game.to_string());
        assert!(out.args.contains(&format!("-Dfabric.gameJarPath={staged_game}")));
    }

    #[test]
    fn unrelocated_indirect_entries_are_warned_about() {
        let tmp = tempfile::tempdir().unwrap();
        let base = FilePath::from_path(tmp.path());
        let data = base.child("mc");
        let root = base.child("mount");
        data.create_dir_all().unwrap();
        root.create_dir_all().unwrap();
        let stray = base.child("stray.jar");
        stray.write_string("stray").unwrap();

        let groups = format!("-Dfabric.classPathGroups={stray}");
        let (ctx, captured) = capturing_context(LevelFilter::WARN);
        let out = ctx.in_scope(|| rewrite(&["java.exe", &groups, "Main"], &data, &root));

        assert!(out.args.contains(&groups));
        let text = captured.text();
        assert!(text.contains("was not relocated"));
        assert!(text.contains("stray.jar"));
    }

    #[test]
    fn properties_are_read() {
        let cmd = SandboxCommandLine::new(strings(&[
            "java.exe",
            "-Dfabric.development=true",
            "-Dlog4j.configurationFile=C:\\dev\\log4j.xml",
            "-Dflag",
            "--assetsDir",
            "C:\\assets",
        ]));
        assert!(cmd.is_dev_env());
        assert_eq!(cmd.jvm_prop("flag"), Some(""));
        assert_eq!(cmd.jvm_prop("fla"), None);
        assert_eq!(cmd.log_config(), Some(FilePath::new("C:\\dev\\log4j.xml")));
        assert_eq!(cmd.assets_dir(), Some(FilePath::new("C:\\assets")));
        assert!(!SandboxCommandLine::new(strings(&["java.exe", "-Dfabric.development=false"])).is_dev_env());
    }

    #[test]
    fn java_home_is_two_levels_up() {
        let tmp = tempfile::tempdir().unwrap();
        let home = FilePath::from_path(tmp.path()).child("jdk");
        let java = home.child("bin\\java.exe");
        java.parent().unwrap().create_dir_all().unwrap();
        java.write_string("").unwrap();
        let cmd = SandboxCommandLine::new(vec![java.to_string()]);
        assert_eq!(cmd.application_path().unwrap(), java);
        assert_eq!(cmd.java_home().unwrap(), home);
    }

    #[test]
    fn empty_command_line_is_a_configuration_error() {
        let err = SandboxCommandLine::new(vec![]).application_path().unwrap_err();
        assert!(matches!(err, SandboxError::Configuration(_)));
    }

    #[test]
    fn arg_files_are_expanded() {
        let tmp = tempfile::tempdir().unwrap();
        let file = FilePath::from_path(tmp.path()).child("args.txt");
        file.write_string("-Xmx2G\r\n  -Dfoo=bar  \r\n\r\nMain\n").unwrap();
        let cmd = SandboxCommandLine::from_args(strings(&["java.exe", &format!("@{file}"), "--demo"])).unwrap();
        assert_eq!(cmd.args(), strings(&["java.exe", "-Xmx2G", "-Dfoo=bar", "Main", "--demo"]).as_slice());
    }
}
