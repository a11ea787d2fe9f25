use super::*;
use clap::error::ErrorKind;

fn test_layout() -> (tempfile::TempDir, PrefixLayout) {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let layout = PrefixLayout::new(dir.path().join("prefix"));
    (dir, layout)
}

fn register_numerics(layout: &PrefixLayout) {
    run_register_command(layout, "gmp", "6.3.0", &[], &["lib/libgmp.so".to_string()])
        .expect("must register gmp");
    run_register_command(
        layout,
        "mpfr",
        "4.2.1",
        &["gmp".to_string()],
        &["lib/libmpfr.so".to_string()],
    )
    .expect("must register mpfr");
    run_register_command(layout, "mpc", "1.3.1", &["mpfr".to_string()], &[])
        .expect("must register mpc");
}

fn names(plan: &RebuildPlan) -> Vec<&str> {
    plan.names()
}

#[test]
fn cli_parses_invalidate_with_repeated_flags() {
    let cli = Cli::try_parse_from([
        "respin",
        "--prefix",
        "/opt/sage/local",
        "invalidate",
        "--root",
        "sage",
        "--exclude",
        "gcc",
        "--exclude",
        "binutils",
        "--touch",
        "configure",
    ])
    .expect("must parse");

    assert_eq!(cli.prefix, Some(PathBuf::from("/opt/sage/local")));
    match cli.command {
        Commands::Invalidate {
            root,
            excluded,
            touch,
        } => {
            assert_eq!(root.as_deref(), Some("sage"));
            assert_eq!(excluded, vec!["gcc", "binutils"]);
            assert_eq!(touch, vec![PathBuf::from("configure")]);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_requires_names_for_soft_uninstall() {
    let err = Cli::try_parse_from(["respin", "soft-uninstall"])
        .expect_err("at least one name is required");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn cli_counts_verbosity() {
    let cli = Cli::try_parse_from(["respin", "-vv", "list"]).expect("must parse");
    assert_eq!(cli.verbose, 2);
}

#[test]
fn config_defaults_when_file_is_absent() {
    let (_dir, layout) = test_layout();
    let config = load_config(None, &layout).expect("must load defaults");
    assert_eq!(config, RespinConfig::default());
    assert_eq!(config.root_or_default(None), "default");
    assert_eq!(config.root_or_default(Some("sage".to_string())), "sage");
}

#[test]
fn config_reads_rebuild_section() {
    let config = RespinConfig::from_toml_str(
        r#"
[rebuild]
command = "make -C build/{name} install"
default_excluded = ["gcc"]
default_root = "sage"
"#,
    )
    .expect("config must parse");

    assert_eq!(
        config.rebuild.command.as_deref(),
        Some("make -C build/{name} install")
    );
    assert_eq!(config.rebuild.default_excluded, vec!["gcc"]);
    assert_eq!(config.root_or_default(None), "sage");
}

#[test]
fn config_rejects_unknown_keys() {
    let err = RespinConfig::from_toml_str("[rebuild]\nparallel = 4\n")
        .expect_err("unknown key must fail");
    assert!(format!("{err:#}").contains("parallel"), "unexpected error: {err:#}");
}

#[test]
fn explicit_config_path_must_exist() {
    let (dir, layout) = test_layout();
    let missing = dir.path().join("nope.toml");
    let err = load_config(Some(&missing), &layout).expect_err("missing config must fail");
    assert!(err.to_string().contains("failed to read config"));
}

#[test]
fn register_persists_and_lists_packages() {
    let (_dir, layout) = test_layout();
    register_numerics(&layout);

    let state = load_state(&layout).expect("must load");
    assert_eq!(
        format_list_lines(&state.registry),
        vec![
            "gmp 6.3.0 (installed)",
            "mpc 1.3.1 (installed)",
            "mpfr 4.2.1 (installed)",
        ]
    );
    assert!(!layout.registry_lock_path().exists());
}

#[test]
fn register_rejects_unsafe_names_and_self_dependencies() {
    let (_dir, layout) = test_layout();
    assert!(run_register_command(&layout, "../gmp", "1", &[], &[]).is_err());
    assert!(run_register_command(&layout, "gmp", " ", &[], &[]).is_err());
    let err = run_register_command(&layout, "gmp", "1", &["gmp".to_string()], &[])
        .expect_err("self dependency must fail");
    assert!(err.to_string().contains("cannot depend on itself"));
}

#[test]
fn register_rejects_values_that_would_corrupt_the_record() {
    let (_dir, layout) = test_layout();
    register_numerics(&layout);

    let err = run_register_command(
        &layout,
        "mpfr",
        "4.2.1",
        &["gmp".to_string()],
        &["lib/libmpfr.so\nstatus=not_installed".to_string()],
    )
    .expect_err("line break in file must fail");
    assert!(err.to_string().contains("package file must not contain line breaks"));

    let err = run_register_command(&layout, "mpfr", "4.2.1\nstatus=not_installed", &[], &[])
        .expect_err("line break in version must fail");
    assert!(err.to_string().contains("package version must not contain line breaks"));

    let err = run_register_command(&layout, "mpfr", "4.2.1", &["gmp\nfile=x".to_string()], &[])
        .expect_err("dependency must be a package name");
    assert!(format!("{err:#}").contains("invalid dependency of 'mpfr'"));

    let state = load_state(&layout).expect("must load");
    let mpfr = state.registry.lookup("mpfr").expect("mpfr");
    assert_eq!(mpfr.status, PackageStatus::Installed);
    assert_eq!(mpfr.files.iter().collect::<Vec<_>>(), vec!["lib/libmpfr.so"]);
}

#[test]
fn invalidate_rejects_excluded_names_with_line_breaks() {
    let (_dir, layout) = test_layout();
    let err = run_invalidate_command(
        &layout,
        &RespinConfig::default(),
        "sage",
        &["gcc\nexclude=gmp".to_string()],
        &[],
    )
    .expect_err("line break must fail");
    assert!(err.to_string().contains("invalid excluded package"));
    assert!(!layout.dirty_marker_path("sage").exists());
}

#[test]
fn save_state_leaves_records_untouched_when_a_marker_cannot_be_written() {
    let (_dir, layout) = test_layout();
    register_numerics(&layout);

    let mut state = load_state(&layout).expect("must load");
    state
        .registry
        .set_status("gmp", PackageStatus::SoftUninstalled)
        .expect("gmp is registered");
    let bad: ExclusionSet = ["gcc\nexclude=mpfr"].into_iter().collect();
    invalidate(&mut state.invalidation, "sage", &bad);

    save_state(&layout, &state).expect_err("invalid marker must fail");
    let reloaded = load_state(&layout).expect("must load");
    assert_eq!(
        reloaded.registry.lookup("gmp").expect("gmp").status,
        PackageStatus::Installed
    );
    assert!(!reloaded.invalidation.is_dirty("sage"));
}

#[test]
fn show_lists_dependents_and_missing_files() {
    let (_dir, layout) = test_layout();
    register_numerics(&layout);
    let gmp_lib = layout.resolve_owned_path("lib/libgmp.so");
    std::fs::create_dir_all(gmp_lib.parent().expect("parent")).expect("must create lib dir");
    std::fs::write(&gmp_lib, b"gmp").expect("must write lib");

    let state = load_state(&layout).expect("must load");
    let lines = format_show_lines(&layout, &state.registry, "gmp").expect("gmp is registered");
    assert_eq!(
        lines,
        vec![
            "Package: gmp",
            "Version: 6.3.0",
            "Status: installed",
            "Dependencies: none",
            "Dependents: mpfr",
            "Files: 1",
            "- lib/libgmp.so",
        ]
    );

    let lines = format_show_lines(&layout, &state.registry, "mpfr").expect("mpfr is registered");
    assert!(lines.contains(&"- lib/libmpfr.so (missing)".to_string()));

    let err = format_show_lines(&layout, &state.registry, "nonexistent")
        .expect_err("unknown package must fail");
    assert_eq!(err.to_string(), "package 'nonexistent' is not registered");
}

#[test]
fn soft_uninstall_command_is_all_or_nothing() {
    let (_dir, layout) = test_layout();
    register_numerics(&layout);

    let err = run_soft_uninstall_command(&layout, &["gmp".to_string(), "flint".to_string()])
        .expect_err("flint is not registered");
    assert_eq!(err.to_string(), "package 'flint' is not registered");
    let state = load_state(&layout).expect("must load");
    assert_eq!(
        state.registry.lookup("gmp").expect("gmp").status,
        PackageStatus::Installed
    );

    let results = run_soft_uninstall_command(&layout, &["gmp".to_string(), "gmp".to_string()])
        .expect("must soft-uninstall");
    assert_eq!(
        format_soft_uninstall_lines(&results, OutputStyle::Rich),
        vec![
            "[OK] soft-uninstalled gmp 6.3.0 (files kept)",
            "[SKIP] gmp 6.3.0 already soft-uninstalled",
        ]
    );
}

#[test]
fn invalidate_merges_configured_and_requested_exclusions() {
    let (_dir, layout) = test_layout();
    register_numerics(&layout);
    let config = RespinConfig::from_toml_str("[rebuild]\ndefault_excluded = [\"gcc\"]\n")
        .expect("config must parse");
    let stamp = layout.prefix().join("configure");

    let recorded = run_invalidate_command(
        &layout,
        &config,
        "sage",
        &["binutils".to_string()],
        std::slice::from_ref(&stamp),
    )
    .expect("must invalidate");

    assert_eq!(recorded.iter().collect::<Vec<_>>(), vec!["binutils", "gcc"]);
    assert!(stamp.exists());
    assert!(layout.dirty_marker_path("sage").exists());
    assert_eq!(
        format_invalidate_lines("sage", &recorded, OutputStyle::Plain),
        vec!["marked build root 'sage' dirty (excluded: binutils, gcc)"]
    );

    let err = run_invalidate_command(&layout, &config, "../sage", &[], &[])
        .expect_err("unsafe root must fail");
    assert!(err.to_string().contains("build root name"));
}

#[test]
fn plan_follows_soft_uninstall_and_invalidation() {
    let (_dir, layout) = test_layout();
    register_numerics(&layout);
    let config = RespinConfig::default();

    let plan = run_plan_command(&layout, "sage").expect("must plan");
    assert_eq!(format_plan_lines(&plan, false), vec!["build root 'sage' is clean"]);

    run_soft_uninstall_command(&layout, &["gmp".to_string(), "mpfr".to_string(), "mpc".to_string()])
        .expect("must soft-uninstall");
    run_invalidate_command(&layout, &config, "sage", &["gcc".to_string()], &[])
        .expect("must invalidate");

    let plan = run_plan_command(&layout, "sage").expect("must plan");
    assert_eq!(names(&plan), vec!["gmp", "mpfr", "mpc"]);
    assert_eq!(
        format_plan_lines(&plan, true),
        vec!["gmp 6.3.0", "mpfr 4.2.1", "mpc 1.3.1"]
    );

    let value = plan_json(&plan, true);
    assert_eq!(value["root"], "sage");
    assert_eq!(value["dirty"], true);
    assert_eq!(value["excluded"][0], "gcc");
    assert_eq!(value["packages"][1]["name"], "mpfr");
    assert_eq!(value["packages"][1]["status"], "soft_uninstalled");
}

#[test]
fn command_template_substitutes_package_fields() {
    let package = Package::new("mpfr", "4.2.1");
    assert_eq!(
        render_command_template(
            "make -C {prefix}/build/{name}-{version} install",
            &package,
            Path::new("/opt/sage/local")
        ),
        "make -C /opt/sage/local/build/mpfr-4.2.1 install"
    );
}

#[cfg(unix)]
#[test]
fn rebuild_command_runs_template_and_clears_marker() {
    let (_dir, layout) = test_layout();
    register_numerics(&layout);
    run_soft_uninstall_command(&layout, &["gmp".to_string()]).expect("must soft-uninstall");
    run_invalidate_command(&layout, &RespinConfig::default(), "sage", &[], &[])
        .expect("must invalidate");

    let mut seen = Vec::new();
    let report = run_rebuild_command(
        &layout,
        "sage",
        "echo \"$RESPIN_PACKAGE\" >> build.log",
        |package| seen.push(package.name.clone()),
    )
    .expect("must rebuild");

    assert_eq!(seen, vec!["gmp", "mpfr", "mpc"]);
    assert!(report.is_success());
    assert!(report.marker_cleared);
    assert!(!layout.dirty_marker_path("sage").exists());
    let log = std::fs::read_to_string(layout.prefix().join("build.log")).expect("build log");
    assert_eq!(log, "gmp\nmpfr\nmpc\n");

    let state = load_state(&layout).expect("must load");
    assert!(state.registry.packages().all(|package| package.is_installed()));
    assert_eq!(
        format_rebuild_report_lines(&report, OutputStyle::Plain).last(),
        Some(&"build root 'sage' is clean".to_string())
    );
}

#[cfg(unix)]
#[test]
fn rebuild_command_failure_keeps_root_dirty() {
    let (_dir, layout) = test_layout();
    register_numerics(&layout);
    run_soft_uninstall_command(&layout, &["gmp".to_string()]).expect("must soft-uninstall");
    run_invalidate_command(&layout, &RespinConfig::default(), "sage", &[], &[])
        .expect("must invalidate");

    let report = run_rebuild_command(
        &layout,
        "sage",
        "test \"{name}\" != mpfr || { echo boom >&2; exit 3; }",
        |_| {},
    )
    .expect("pass must complete");

    assert_eq!(report.built(), vec!["gmp"]);
    assert_eq!(report.failed(), vec!["mpfr"]);
    assert_eq!(report.blocked(), vec!["mpc"]);
    assert!(layout.dirty_marker_path("sage").exists());

    let lines = format_rebuild_report_lines(&report, OutputStyle::Rich);
    assert_eq!(lines[0], "[OK] rebuilt gmp 6.3.0");
    assert!(lines[1].starts_with("[ERR] failed mpfr 4.2.1: build of mpfr 4.2.1 failed"));
    assert!(lines[1].contains("stderr='boom'"));
    assert_eq!(
        lines[2],
        "[SKIP] skipped mpc 1.3.1 (dependency mpfr did not build)"
    );
    assert_eq!(
        lines[3],
        "[WARN] build root 'sage' stays dirty; rerun rebuild after fixing failures"
    );

    let state = load_state(&layout).expect("must load");
    assert_eq!(
        state.registry.lookup("gmp").expect("gmp").status,
        PackageStatus::Installed
    );
    assert_eq!(names(&run_plan_command(&layout, "sage").expect("plan")), vec!["mpfr", "mpc"]);
}

#[test]
fn rebuild_is_rejected_while_registry_is_locked() {
    let (_dir, layout) = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    std::fs::write(layout.registry_lock_path(), "4242\n").expect("must seed lock");

    let err = run_rebuild_command(&layout, "sage", "true", |_| {})
        .expect_err("held lock must block");
    assert!(err.to_string().contains("registry lock already held (pid=4242)"));

    let state = load_state(&layout).expect("must load");
    assert!(format_doctor_lines(&layout, &state)
        .expect("doctor")
        .contains(&"registry lock: held (pid=4242)".to_string()));
}

#[test]
fn cli_parses_repair() {
    let cli = Cli::try_parse_from(["respin", "repair"]).expect("must parse");
    assert!(matches!(cli.command, Commands::Repair));
}

#[cfg(unix)]
#[test]
fn repair_clears_lock_left_by_interrupted_rebuild() {
    let (_dir, layout) = test_layout();
    register_numerics(&layout);
    let mut child = std::process::Command::new("true")
        .spawn()
        .expect("must spawn child");
    let exited_pid = child.id();
    child.wait().expect("child must exit");
    std::fs::write(layout.registry_lock_path(), format!("{exited_pid}\n"))
        .expect("must seed lock");

    let err = run_register_command(&layout, "flint", "3.1.0", &[], &[])
        .expect_err("leftover lock blocks writers");
    assert!(err.to_string().contains("run `respin repair`"));

    let repair = run_repair_command(&layout).expect("must repair");
    assert_eq!(
        format_repair_lines(&repair, OutputStyle::Plain),
        vec![format!("repair: cleared stale registry lock (pid={exited_pid})")]
    );
    assert!(!layout.registry_lock_path().exists());
    run_register_command(&layout, "flint", "3.1.0", &[], &[]).expect("writers work again");

    let repair = run_repair_command(&layout).expect("nothing to repair");
    assert_eq!(repair, LockRepair::NotHeld);
}

#[test]
fn repair_refuses_to_clear_lock_of_running_process() {
    let (_dir, layout) = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let pid = std::process::id();
    std::fs::write(layout.registry_lock_path(), format!("{pid}\n")).expect("must seed lock");

    let err = run_repair_command(&layout).expect_err("live holder must be kept");
    assert!(err.to_string().contains(&format!("held by running process {pid}")));
    assert!(layout.registry_lock_path().exists());
}

#[test]
fn doctor_reports_dirty_roots_and_missing_files() {
    let (_dir, layout) = test_layout();
    register_numerics(&layout);
    run_invalidate_command(
        &layout,
        &RespinConfig::default(),
        "sage",
        &["gcc".to_string()],
        &[],
    )
    .expect("must invalidate");

    let state = load_state(&layout).expect("must load");
    let lines = format_doctor_lines(&layout, &state).expect("doctor");
    assert!(lines.contains(&"packages: 3".to_string()));
    assert!(lines.contains(&"registry lock: free".to_string()));
    assert!(lines.contains(&"dirty root: sage (excluded: gcc)".to_string()));
    assert!(lines.contains(&"missing files: gmp (1 of 1)".to_string()));
    assert!(lines.contains(&"missing files: mpfr (1 of 1)".to_string()));
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "rebuilt gmp 6.3.0"),
        "rebuilt gmp 6.3.0"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "build root stays dirty"),
        "[WARN] build root stays dirty"
    );
}

#[test]
fn rebuild_summary_is_hidden_in_plain_mode() {
    let elapsed = std::time::Duration::from_millis(1_204);
    assert!(render_rebuild_summary(OutputStyle::Plain, 1, 3, elapsed).is_none());
    assert_eq!(
        render_rebuild_summary(OutputStyle::Rich, 3, 3, elapsed).as_deref(),
        Some("attempted 3 of 3 planned package(s) in 1.204s")
    );
}

#[test]
fn completions_script_names_binary() {
    let mut buffer = Vec::new();
    write_completions_script(clap_complete::Shell::Bash, &mut buffer)
        .expect("must write completions");
    let script = String::from_utf8(buffer).expect("utf8");
    assert!(script.contains("respin"));
    assert!(script.contains("soft-uninstall"));
}
