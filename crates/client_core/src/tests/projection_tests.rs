use super::*;
use shared::{domain::PlotValue, protocol::SerialComm};
use tokio::sync::broadcast::error::TryRecvError;

use crate::error::ClientError;

fn projections_with(options: PlotOptions) -> Projections {
    Projections::new(options, 16)
}

#[test]
fn console_keeps_only_the_latest_serial_comm() {
    let mut projections = Projections::default();
    for data in ["BREAK\r\n", "ADCP 1200 kHz\r\n", "B"] {
        projections.console.apply(SerialComm { data: data.into() }, Utc::now());
    }
    assert_eq!(projections.console.text(), "B");
    assert!(projections.console.updated_at().is_some());
}

#[test]
fn console_content_is_not_sanitized() {
    let mut projections = Projections::default();
    let raw = "<b>&lt;ok&gt;</b>";
    projections.console.apply(SerialComm { data: raw.into() }, Utc::now());
    assert_eq!(projections.console.text(), raw);
}

#[test]
fn ensemble_labels_are_mirrored_in_one_update() {
    let mut projections = Projections::default();
    let mut updates = projections.subscribe();

    projections.ensemble.apply(AdcpEns {
        adcp_ens_num: EnsembleNumber::Integer(318),
    });

    assert_eq!(projections.ensemble.labels(), ("318", "318"));
    assert_eq!(
        projections.ensemble.number(),
        Some(&EnsembleNumber::Integer(318))
    );
    assert_eq!(
        updates.try_recv().expect("update"),
        ProjectionUpdate::Ensemble {
            ensemble_label: "318".into(),
            status_label: "318".into(),
        }
    );
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn init_then_append_preserves_order() {
    let mut projections = Projections::default();
    projections
        .plot
        .init(vec![PlotValue::from(0)], vec![0.0])
        .expect("init");
    projections
        .plot
        .append(PlotValue::from(1), 5.0)
        .expect("append");
    assert_eq!(
        projections.plot.points(),
        &[PlotPoint::new(0, 0.0), PlotPoint::new(1, 5.0)]
    );
}

#[test]
fn append_before_init_is_rejected_without_side_effects() {
    let mut projections = Projections::default();
    let mut updates = projections.subscribe();

    let err = projections
        .plot
        .append(PlotValue::from(1), 5.0)
        .expect_err("must fail");

    assert!(matches!(err, ClientError::OutOfOrderUpdate));
    assert!(projections.plot.points().is_empty());
    assert!(!projections.plot.is_initialized());
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn init_replaces_previous_series() {
    let mut projections = Projections::default();
    projections
        .plot
        .init(vec![PlotValue::from(0)], vec![0.0])
        .expect("first init");
    projections
        .plot
        .append(PlotValue::from(1), 2.0)
        .expect("append");
    projections
        .plot
        .init(
            vec![PlotValue::from("10:00:00"), PlotValue::from("10:00:01")],
            vec![11.9, 12.1],
        )
        .expect("second init");

    assert_eq!(
        projections.plot.points(),
        &[
            PlotPoint::new("10:00:00", 11.9),
            PlotPoint::new("10:00:01", 12.1)
        ]
    );
}

#[test]
fn init_with_mismatched_lengths_leaves_series_alone() {
    let mut projections = Projections::default();
    projections
        .plot
        .init(vec![PlotValue::from(0)], vec![0.0])
        .expect("init");

    let err = projections
        .plot
        .init(vec![PlotValue::from(1), PlotValue::from(2)], vec![1.0])
        .expect_err("must fail");

    assert!(matches!(
        err,
        ClientError::PlotLengthMismatch { x_len: 2, y_len: 1 }
    ));
    assert_eq!(projections.plot.points(), &[PlotPoint::origin()]);
}

#[test]
fn appends_keep_duplicate_abscissas() {
    let mut projections = Projections::default();
    projections
        .plot
        .init(vec![PlotValue::from(0)], vec![0.0])
        .expect("init");
    projections
        .plot
        .append(PlotValue::from(1), 1.0)
        .expect("append");
    projections
        .plot
        .append(PlotValue::from(1), 3.0)
        .expect("append");
    assert_eq!(projections.plot.points().len(), 3);
    assert_eq!(projections.plot.points()[2], PlotPoint::new(1, 3.0));
}

#[test]
fn placeholder_seed_is_silent_by_default() {
    let mut projections = projections_with(PlotOptions::default());
    let mut updates = projections.subscribe();

    assert!(projections.plot.seed_placeholder());
    projections
        .plot
        .append(PlotValue::from(1), 4.0)
        .expect("append after placeholder");

    assert!(projections.plot.is_placeholder());
    assert_eq!(projections.plot.points().len(), 2);
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));

    projections
        .plot
        .init(vec![PlotValue::from(0)], vec![12.0])
        .expect("server seed");
    assert!(!projections.plot.is_placeholder());
    assert_eq!(
        updates.try_recv().expect("seeded"),
        ProjectionUpdate::PlotSeeded {
            points: vec![PlotPoint::new(0, 12.0)],
        }
    );
}

#[test]
fn placeholder_seed_can_be_rendered() {
    let mut projections = projections_with(PlotOptions {
        render_placeholder_seed: true,
        max_points: None,
    });
    let mut updates = projections.subscribe();

    projections.plot.seed_placeholder();
    assert_eq!(
        updates.try_recv().expect("seeded"),
        ProjectionUpdate::PlotSeeded {
            points: vec![PlotPoint::origin()],
        }
    );
}

#[test]
fn placeholder_never_overwrites_an_initialized_series() {
    let mut projections = Projections::default();
    projections
        .plot
        .init(vec![PlotValue::from(0)], vec![9.0])
        .expect("init");

    assert!(!projections.plot.seed_placeholder());
    assert_eq!(projections.plot.points(), &[PlotPoint::new(0, 9.0)]);
}

#[test]
fn max_points_evicts_oldest_samples() {
    let mut projections = projections_with(PlotOptions {
        render_placeholder_seed: false,
        max_points: Some(3),
    });
    let mut updates = projections.subscribe();
    projections
        .plot
        .init(vec![PlotValue::from(0)], vec![0.0])
        .expect("init");
    for i in 1..=4 {
        projections
            .plot
            .append(PlotValue::from(i), f64::from(i))
            .expect("append");
    }
    let xs: Vec<String> = projections
        .plot
        .points()
        .iter()
        .map(|p| p.x.to_string())
        .collect();
    assert_eq!(xs, vec!["2", "3", "4"]);

    let mut received = Vec::new();
    while let Ok(update) = updates.try_recv() {
        received.push(update);
    }
    assert_eq!(received.len(), 5);
    assert_eq!(
        received[2],
        ProjectionUpdate::PlotAppended {
            point: PlotPoint::new(2, 2.0)
        }
    );
    // Once the cap bites, renderers get the whole retained series.
    assert_eq!(
        received[3],
        ProjectionUpdate::PlotSeeded {
            points: vec![
                PlotPoint::new(1, 1.0),
                PlotPoint::new(2, 2.0),
                PlotPoint::new(3, 3.0),
            ]
        }
    );
    assert_eq!(
        received[4],
        ProjectionUpdate::PlotSeeded {
            points: projections.plot.points().to_vec()
        }
    );
}

#[test]
fn max_points_caps_an_oversized_seed() {
    let mut projections = projections_with(PlotOptions {
        render_placeholder_seed: false,
        max_points: Some(3),
    });
    let mut updates = projections.subscribe();
    projections
        .plot
        .init(
            (0..5i32).map(PlotValue::from).collect(),
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
        )
        .expect("init");
    assert_eq!(projections.plot.points().len(), 3);
    assert_eq!(
        updates.try_recv().expect("seeded"),
        ProjectionUpdate::PlotSeeded {
            points: vec![
                PlotPoint::new(2, 2.0),
                PlotPoint::new(3, 3.0),
                PlotPoint::new(4, 4.0),
            ]
        }
    );

    projections
        .plot
        .append(PlotValue::from(5), 5.0)
        .expect("append");
    let xs: Vec<String> = projections
        .plot
        .points()
        .iter()
        .map(|p| p.x.to_string())
        .collect();
    assert_eq!(xs, vec!["3", "4", "5"]);
}

#[test]
fn status_report_changes_nothing() {
    let projections = Projections::default();
    let before = projections.snapshot();
    projections.apply_status_report(
        &StatusReport {
            count: 3,
            data: "Server generated event".into(),
        },
        None,
    );
    assert_eq!(projections.snapshot(), before);
}
