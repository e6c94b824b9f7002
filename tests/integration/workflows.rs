//! End-to-end domain workflows

use caseworks_server::{
    config::{AppConfig, RentalsConfig},
    error::AppError,
    models::{
        customization::{CreateCustomization, CustomizationStage, TransitionStage},
        equipment::EquipmentStatus,
        rental::{CreateRental, RentalStatus, ReturnRental},
    },
};
use chrono::{Duration, NaiveDate};

use crate::common::{admin, harness, harness_with, register, therapist};

fn rental(equipment_id: i32, quantity: i32) -> CreateRental {
    CreateRental {
        equipment_id,
        client_id: 31,
        quantity,
        rental_date: None,
        expected_return_date: NaiveDate::from_ymd_opt(2025, 7, 1),
        notes: None,
    }
}

#[tokio::test]
async fn test_rent_adjust_return_scenario() {
    let h = harness();
    let item = register(&h, "Standard wheelchair", 5).await;
    assert_eq!((item.total_quantity, item.available_quantity, item.status), (5, 5, EquipmentStatus::Normal));

    let r1 = h.services.rentals.create(&therapist(), rental(item.id, 2)).await.unwrap();
    let current = h.services.inventory.get(&admin(), item.id).await.unwrap();
    assert_eq!(current.available_quantity, 3);

    let err = h.services.inventory.adjust_quantity(&admin(), item.id, 5, 2).await.unwrap_err();
    match err {
        AppError::InvalidQuantity { minimum_available, .. } => assert_eq!(minimum_available, Some(3)),
        other => panic!("unexpected error: {other:?}"),
    }

    let returned = h
        .services
        .rentals
        .return_rental(&therapist(), r1.id, ReturnRental::default())
        .await
        .unwrap();
    assert_eq!(returned.status, RentalStatus::Returned);
    assert_eq!(h.services.inventory.get(&admin(), item.id).await.unwrap().available_quantity, 5);

    let err = h
        .services
        .rentals
        .return_rental(&therapist(), r1.id, ReturnRental::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyReturned(_)));
    assert_eq!(h.services.inventory.get(&admin(), item.id).await.unwrap().available_quantity, 5);
}

#[tokio::test]
async fn test_customization_scenario() {
    let h = harness();
    let request = h
        .services
        .customizations
        .create(
            &therapist(),
            CreateCustomization {
                client_id: 31,
                title: "Moulded seat insert".to_string(),
                description: Some("Pressure relief for long sitting".to_string()),
                requested_date: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(request.status, CustomizationStage::Requested);

    let outcome = h
        .services
        .customizations
        .transition_stage(&therapist(), request.id, TransitionStage::to(CustomizationStage::Designing))
        .await
        .unwrap();
    assert!(outcome.history_entry.is_some());
    assert_eq!(h.services.customizations.history(&admin(), request.id).await.unwrap().len(), 1);

    let err = h
        .services
        .customizations
        .transition_stage(&therapist(), request.id, TransitionStage::to(CustomizationStage::Completed))
        .await
        .unwrap_err();
    match err {
        AppError::IllegalTransition { allowed, .. } => {
            assert_eq!(allowed, vec!["prototyping".to_string(), "cancelled".to_string()])
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_stage_graph_closure() {
    let h = harness();
    let path = [
        CustomizationStage::Requested,
        CustomizationStage::Designing,
        CustomizationStage::Prototyping,
        CustomizationStage::Fitting,
        CustomizationStage::Completed,
    ];

    // Reach each stage on a fresh request, then try every target from there
    for (depth, from) in path.iter().copied().chain([CustomizationStage::Cancelled]).enumerate() {
        for to in CustomizationStage::ALL {
            let request = h
                .services
                .customizations
                .create(
                    &admin(),
                    CreateCustomization {
                        client_id: 1,
                        title: format!("{from} to {to}"),
                        description: None,
                        requested_date: None,
                    },
                )
                .await
                .unwrap();

            if from == CustomizationStage::Cancelled {
                h.services.customizations.cancel(&admin(), request.id, None).await.unwrap();
            } else {
                for stage in &path[1..=depth] {
                    h.services
                        .customizations
                        .transition_stage(&admin(), request.id, TransitionStage::to(*stage))
                        .await
                        .unwrap();
                }
            }

            let result = h
                .services
                .customizations
                .transition_stage(&admin(), request.id, TransitionStage::to(to))
                .await;

            match (from.is_terminal(), from.can_transition_to(to), result) {
                (true, _, Err(AppError::TerminalState { .. })) => {}
                (false, true, Ok(outcome)) => assert_eq!(outcome.request.status, to),
                (false, false, Err(AppError::IllegalTransition { .. })) => {}
                (_, _, other) => panic!("{from} -> {to}: unexpected {other:?}"),
            }
        }
    }
}

#[tokio::test]
async fn test_retired_equipment_stays_retired_and_unrentable() {
    let h = harness();
    let item = register(&h, "Hoist", 2).await;

    h.services
        .inventory
        .change_status(&admin(), item.id, EquipmentStatus::Retired)
        .await
        .unwrap();
    let err = h
        .services
        .inventory
        .change_status(&admin(), item.id, EquipmentStatus::Normal)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::IllegalTransition { .. }));

    let err = h.services.rentals.create(&therapist(), rental(item.id, 1)).await.unwrap_err();
    assert!(matches!(err, AppError::TerminalState { .. }));
}

#[tokio::test]
async fn test_maintenance_policy_is_configurable() {
    let strict = harness_with(AppConfig {
        rentals: RentalsConfig { block_maintenance: true },
        ..AppConfig::default()
    });
    let item = register(&strict, "Standing frame", 1).await;
    strict
        .services
        .inventory
        .change_status(&admin(), item.id, EquipmentStatus::Maintenance)
        .await
        .unwrap();
    assert!(strict.services.rentals.create(&therapist(), rental(item.id, 1)).await.is_err());

    let lenient = harness();
    let item = register(&lenient, "Standing frame", 1).await;
    lenient
        .services
        .inventory
        .change_status(&admin(), item.id, EquipmentStatus::Maintenance)
        .await
        .unwrap();
    assert!(lenient.services.rentals.create(&therapist(), rental(item.id, 1)).await.is_ok());
}

#[tokio::test]
async fn test_return_date_defaults_to_clock_today() {
    let h = harness();
    let item = register(&h, "Bath board", 1).await;
    let r = h.services.rentals.create(&therapist(), rental(item.id, 1)).await.unwrap();

    h.clock.advance(Duration::days(3));
    let returned = h
        .services
        .rentals
        .return_rental(&therapist(), r.id, ReturnRental::default())
        .await
        .unwrap();
    assert_eq!(returned.actual_return_date, NaiveDate::from_ymd_opt(2025, 6, 5));
}

#[tokio::test]
async fn test_mutations_are_audited() {
    let h = harness();
    let item = register(&h, "Commode", 3).await;
    let r = h.services.rentals.create(&therapist(), rental(item.id, 1)).await.unwrap();
    h.services.rentals.cancel_rental(&therapist(), r.id, None).await.unwrap();
    h.services.inventory.delete(&admin(), item.id).await.unwrap();

    assert_eq!(
        h.audit.event_names(),
        vec!["equipment.registered", "rental.created", "rental.cancelled", "equipment.deleted"]
    );
    let (_, deleted) = h.audit.events().pop().unwrap();
    assert_eq!(deleted.actor_id, Some(1));
}
