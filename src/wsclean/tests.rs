use vec1::vec1;

use super::*;

#[test]
fn test_parse_pixel_scale() {
    let scale: PixelScale = "2.5asec".parse().unwrap();
    assert_eq!(
        scale,
        PixelScale {
            value: 2.5,
            unit: ScaleUnit::Asec
        }
    );
    assert_eq!(scale.to_string(), "2.5asec");

    let scale: PixelScale = " 40 MASEC ".parse().unwrap();
    assert_eq!(scale.unit, ScaleUnit::Masec);
    assert_eq!(scale.value, 40.0);
    assert_eq!(scale.to_string(), "40masec");

    assert_eq!("1e-3deg".parse::<PixelScale>().unwrap().value, 1e-3);
    assert_eq!("0.5 amin".parse::<PixelScale>().unwrap().unit, ScaleUnit::Amin);

    assert!(matches!(
        "2.5".parse::<PixelScale>(),
        Err(WscleanError::BadScale(_))
    ));
    assert!(matches!(
        "2.5parsec".parse::<PixelScale>(),
        Err(WscleanError::BadScale(_))
    ));
    assert!(matches!(
        "lotsasec".parse::<PixelScale>(),
        Err(WscleanError::BadScaleNumber { unit: "asec", .. })
    ));
}

#[test]
fn test_default_args() {
    let args = WscleanConfig::default().build_args("UDB20241215.ms");
    assert_eq!(
        args,
        [
            "-size",
            "1024",
            "1024",
            "-scale",
            "2.5asec",
            "-weight",
            "briggs",
            "0.0",
            "-name",
            "wsclean",
            "UDB20241215.ms"
        ]
    );
}

#[test]
fn test_all_args() {
    let config = WscleanConfig {
        size: [1024, 1024],
        scale: "2.5asec".parse().unwrap(),
        weight_briggs: 0.0,
        niter: 1000,
        multiscale: true,
        mgain: 0.8,
        data_column: Some("DATA".to_string()),
        pol: Some("xx".to_string()),
        auto_mask: Some(7.0),
        auto_threshold: Some(2.0),
        local_rms: true,
        no_update_model: true,
        no_negative: true,
        quiet: true,
        spws: Some(vec1![4, 5, 6, 7, 8, 9]),
        intervals_out: Some(4),
        name: "eovsa".to_string(),
    };
    config.validate().unwrap();
    let wsclean = Wsclean::new("UDB20241215.ms").with_config(config);
    assert_eq!(
        wsclean.command_line(),
        "wsclean -size 1024 1024 -scale 2.5asec -weight briggs 0.0 -data-column DATA \
         -niter 1000 -multiscale -mgain 0.8 -pol xx -auto-mask 7.0 -auto-threshold 2.0 \
         -local-rms -no-update-model-required -no-negative -intervals-out 4 -quiet \
         -spws 4,5,6,7,8,9 -name eovsa UDB20241215.ms"
    );
}

#[test]
fn test_quiet_is_off_unless_asked_for() {
    let args = WscleanConfig::default().build_args("x.ms");
    assert!(!args.iter().any(|a| a == "-quiet"));

    let args = WscleanConfig {
        quiet: true,
        ..Default::default()
    }
    .build_args("x.ms");
    assert!(args.iter().any(|a| a == "-quiet"));
}

#[test]
fn test_data_column_only_when_set() {
    let args = WscleanConfig::default().build_args("x.ms");
    assert!(!args.iter().any(|a| a == "-data-column"));

    let args = WscleanConfig {
        data_column: Some("CORRECTED_DATA".to_string()),
        ..Default::default()
    }
    .build_args("x.ms");
    assert_eq!(&args[8..10], ["-data-column", "CORRECTED_DATA"]);
}

#[test]
fn test_non_default_size_and_mgain() {
    let args = WscleanConfig {
        size: [512, 256],
        mgain: 1.0,
        niter: 0,
        ..Default::default()
    }
    .build_args("x.ms");
    assert_eq!(&args[..3], ["-size", "512", "256"]);
    assert!(!args.iter().any(|a| a == "-mgain" || a == "-niter"));
}

#[test]
fn test_validation() {
    assert!(WscleanConfig::default().validate().is_ok());

    let bad_configs = [
        WscleanConfig {
            size: [0, 1024],
            ..Default::default()
        },
        WscleanConfig {
            mgain: 0.0,
            ..Default::default()
        },
        WscleanConfig {
            mgain: 1.5,
            ..Default::default()
        },
        WscleanConfig {
            weight_briggs: 2.5,
            ..Default::default()
        },
        WscleanConfig {
            auto_mask: Some(-1.0),
            ..Default::default()
        },
        WscleanConfig {
            auto_threshold: Some(0.0),
            ..Default::default()
        },
        WscleanConfig {
            intervals_out: Some(0),
            ..Default::default()
        },
        WscleanConfig {
            name: " ".to_string(),
            ..Default::default()
        },
        WscleanConfig {
            data_column: Some(String::new()),
            ..Default::default()
        },
    ];
    for config in bad_configs {
        assert!(
            matches!(config.validate(), Err(WscleanError::InvalidSetting { .. })),
            "{config:?}"
        );
    }
}

#[test]
fn test_dry_run_doesnt_need_wsclean() {
    let wsclean = Wsclean {
        executable: "/definitely/not/wsclean".to_string(),
        ..Wsclean::new("x.ms")
    };
    assert_eq!(wsclean.run(true).unwrap(), 0);
    assert!(matches!(
        wsclean.run(false),
        Err(WscleanError::Spawn { .. })
    ));
}

#[test]
fn test_invalid_config_isnt_run() {
    let wsclean = Wsclean::new("x.ms").with_config(WscleanConfig {
        mgain: -1.0,
        ..Default::default()
    });
    assert!(matches!(
        wsclean.run(true),
        Err(WscleanError::InvalidSetting { setting: "mgain", .. })
    ));
}
