use contracts::policy::{policy_from, CARBON_TAX, PUBLIC_TRANSPORT_SUBSIDY, WATER_PRICE_FACTOR};
use contracts::{Policy, TwinConfig, WorldCounts, FEATURE_COUNT};
use proptest::prelude::*;
use twin_core::{new_engine, SimulationEngine};

fn compact_config(seed: u64) -> TwinConfig {
    TwinConfig {
        seed,
        model_seed: seed.wrapping_add(1),
        counts: WorldCounts {
            households: 20,
            industries: 3,
            reservoirs: 1,
            transport_hubs: 2,
            socio_economic_clusters: 2,
            hospitals: 1,
        },
        hidden_size: 8,
        ..TwinConfig::default()
    }
}

fn policy_strategy() -> impl Strategy<Value = Policy> {
    (
        prop::option::of(0.5_f64..3.0),
        prop::option::of(0.0_f64..1.0),
        prop::option::of(0.5_f64..3.0),
    )
        .prop_map(|(tax, subsidy, water)| {
            let mut policy = Policy::new();
            if let Some(tax) = tax {
                policy.insert(CARBON_TAX.to_string(), tax);
            }
            if let Some(subsidy) = subsidy {
                policy.insert(PUBLIC_TRANSPORT_SUBSIDY.to_string(), subsidy);
            }
            if let Some(water) = water {
                policy.insert(WATER_PRICE_FACTOR.to_string(), water);
            }
            policy
        })
}

#[test]
fn five_default_steps_build_six_snapshots() {
    let mut engine = new_engine(32).expect("default engine");
    let trajectory = engine.run_projection(5, None).expect("projection");

    assert_eq!(trajectory.len(), 5);
    assert_eq!(engine.history().len(), 6);
    assert_eq!(engine.history().last().map(|m| m.timestep), Some(5));
    assert_eq!(engine.state().shape(), (293, FEATURE_COUNT));
    assert!(engine.state().iter().all(|value| *value >= 0.0));
}

#[test]
fn default_speculation_with_carbon_tax_is_isolated() {
    let mut engine = new_engine(32).expect("default engine");
    engine.step(None).expect("step");
    let before = engine.capture();

    let speculative = engine
        .speculate(3, Some(&policy_from([(CARBON_TAX, 1.5)])))
        .expect("speculate");
    assert_eq!(speculative.timestep, 4);
    assert!(speculative.composite_sdg_score.is_finite());
    assert_eq!(engine.capture(), before);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn steps_keep_shape_and_non_negative_state(
        seed in 0_u64..5_000,
        steps in 1_u64..8,
        policy in prop::option::of(policy_strategy()),
    ) {
        let mut engine = SimulationEngine::new(compact_config(seed)).expect("engine");
        let rows = engine.node_count();
        for _ in 0..steps {
            engine.step(policy.as_ref()).expect("step");
            prop_assert_eq!(engine.state().shape(), (rows, FEATURE_COUNT));
            prop_assert!(engine.state().iter().all(|value| *value >= 0.0 && value.is_finite()));
        }
    }

    #[test]
    fn history_timesteps_increase_by_one(seed in 0_u64..5_000, steps in 0_u64..8) {
        let mut engine = SimulationEngine::new(compact_config(seed)).expect("engine");
        engine.run_projection(steps, None).expect("projection");
        let timesteps = engine.history().iter().map(|m| m.timestep).collect::<Vec<_>>();
        prop_assert_eq!(timesteps, (0..=steps).collect::<Vec<_>>());
        prop_assert_eq!(engine.current_timestep(), steps);
    }

    #[test]
    fn speculation_never_leaks(
        seed in 0_u64..5_000,
        committed in 0_u64..4,
        speculative in 0_u64..6,
        policy in policy_strategy(),
    ) {
        let mut engine = SimulationEngine::new(compact_config(seed)).expect("engine");
        engine.run_projection(committed, None).expect("projection");
        let before = engine.capture();

        let result = engine.speculate(speculative, Some(&policy)).expect("speculate");
        prop_assert_eq!(result.timestep, committed + speculative);
        prop_assert_eq!(engine.capture(), before);
    }

    #[test]
    fn same_config_same_trajectory(seed in 0_u64..5_000, steps in 1_u64..6) {
        let mut a = SimulationEngine::new(compact_config(seed)).expect("a");
        let mut b = SimulationEngine::new(compact_config(seed)).expect("b");
        prop_assert_eq!(
            a.run_projection(steps, None).expect("a"),
            b.run_projection(steps, None).expect("b")
        );
    }
}
