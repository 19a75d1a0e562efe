//! Verify PPG can learn from synthetic data
//!
//! The batch makes the optimal action obvious:
//! - obs=0: action 0 pays 1, action 1 pays 0
//! - obs=1: action 1 pays 1, action 0 pays 0
//!
//! If the policy phase works, after a few phases:
//! - P(action=0 | obs=0) should increase
//! - P(action=1 | obs=1) should increase

use phasic_rl::prelude::*;

fn bandit_agent(config: PPGConfig) -> PPGAgent {
    let obs = SpaceInfo { shape: vec![1], space_type: SpaceType::Continuous };
    let act = SpaceInfo { shape: vec![], space_type: SpaceType::Discrete(2) };
    PPGAgent::new(config, &obs, &act).unwrap()
}

fn fill_synthetic(agent: &mut PPGAgent) {
    for _ in 0..4 {
        for state in [0.0f32, 1.0] {
            for action in [0.0f32, 1.0] {
                agent.save_eps(Transition {
                    state: vec![state],
                    action: vec![action],
                    reward: if action == state { 1.0 } else { 0.0 },
                    done: true,
                    next_state: vec![state],
                });
            }
        }
    }
}

fn p_correct(agent: &PPGAgent) -> (f32, f32) {
    let lp = agent.log_probs(&[vec![0.0], vec![1.0]], &[vec![0.0], vec![1.0]]).unwrap();
    (lp[0].exp(), lp[1].exp())
}

#[test]
fn test_ppg_learns_from_synthetic_data() {
    let config = PPGConfig::new()
        .learning_rate(0.01)
        .ppo_epochs(10)
        .batch_size(16)
        .gamma(0.5)
        .lam(0.5)
        .policy_kl_range(1.0);
    let mut agent = bandit_agent(config);

    let (p0_before, p1_before) = p_correct(&agent);
    println!("BEFORE training:");
    println!("  P(action=0 | obs=0) = {:.4}", p0_before);
    println!("  P(action=1 | obs=1) = {:.4}", p1_before);

    for _ in 0..3 {
        fill_synthetic(&mut agent);
        agent.run_policy_phase().unwrap();
    }

    let (p0_after, p1_after) = p_correct(&agent);
    println!("AFTER training:");
    println!("  P(action=0 | obs=0) = {:.4}", p0_after);
    println!("  P(action=1 | obs=1) = {:.4}", p1_after);

    assert!(p0_after - p0_before > 0.05, "P(action=0 | obs=0) barely moved: {p0_before} -> {p0_after}");
    assert!(p1_after - p1_before > 0.05, "P(action=1 | obs=1) barely moved: {p1_before} -> {p1_after}");
}

#[test]
fn test_aux_phase_keeps_learned_policy() {
    let config = PPGConfig::new()
        .learning_rate(0.01)
        .ppo_epochs(10)
        .batch_size(16)
        .gamma(0.5)
        .lam(0.5)
        .policy_kl_range(1.0);
    let mut agent = bandit_agent(config);

    for _ in 0..3 {
        fill_synthetic(&mut agent);
        agent.run_policy_phase().unwrap();
    }
    let (p0_trained, p1_trained) = p_correct(&agent);

    // Three phases left 48 states in the aux buffer
    assert_eq!(agent.aux_memory().len(), 48);
    let stats = agent.run_aux_phase().unwrap();
    assert!(stats.joint_loss.is_finite());

    // The KL anchor keeps the distilled policy on the right side
    let (p0_after, p1_after) = p_correct(&agent);
    println!("trained ({p0_trained:.4}, {p1_trained:.4}) -> distilled ({p0_after:.4}, {p1_after:.4})");
    assert!(p0_after > 0.5, "P(action=0 | obs=0) fell to {p0_after}");
    assert!(p1_after > 0.5, "P(action=1 | obs=1) fell to {p1_after}");
}

#[test]
fn test_greedy_policy_after_training() {
    let config = PPGConfig::new()
        .learning_rate(0.01)
        .ppo_epochs(10)
        .batch_size(16)
        .gamma(0.5)
        .lam(0.5)
        .policy_kl_range(1.0);
    let mut agent = bandit_agent(config);

    for _ in 0..10 {
        fill_synthetic(&mut agent);
        agent.run_policy_phase().unwrap();
    }

    agent.eval();
    let actions = agent.act(&[vec![0.0], vec![1.0]]).unwrap();
    assert_eq!(actions, vec![Action::Discrete(0), Action::Discrete(1)]);
}
