//! Ordered agent roster
//!
//! The list is the source of truth for speaking order; the name index is
//! only for lookups and in-place replacement.

use crate::agent::Agent;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Roster {
    agents: Vec<Agent>,
    index: HashMap<String, usize>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. Re-using a name replaces that agent in place and
    /// returns the old one; its speaking position is kept.
    pub fn add(&mut self, agent: Agent) -> Option<Agent> {
        match self.index.get(agent.name()) {
            Some(&position) => Some(std::mem::replace(&mut self.agents[position], agent)),
            None => {
                self.index.insert(agent.name().to_string(), self.agents.len());
                self.agents.push(agent);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Agent> {
        self.index.get(name).map(|&position| &self.agents[position])
    }

    /// Agent due to speak at `turn_index`.
    ///
    /// Strict two-party alternation: only the first two registered agents
    /// ever speak. Callers must ensure at least two are registered.
    pub fn speaker_mut(&mut self, turn_index: usize) -> &mut Agent {
        &mut self.agents[turn_index % 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ScriptedGenerator;
    use std::sync::Arc;

    fn agent(name: &str, personality: &str) -> Agent {
        Agent::new(name, personality, Arc::new(ScriptedGenerator::constant("ok")))
    }

    #[test]
    fn test_insertion_order_is_speaking_order() {
        let mut roster = Roster::new();
        roster.add(agent("Agent A", "curious"));
        roster.add(agent("Agent B", "analytical"));

        assert_eq!(roster.len(), 2);
        assert_eq!(roster.speaker_mut(0).name(), "Agent A");
        assert_eq!(roster.speaker_mut(1).name(), "Agent B");
        assert_eq!(roster.speaker_mut(2).name(), "Agent A");
    }

    #[test]
    fn test_same_name_replaces_in_place() {
        let mut roster = Roster::new();
        roster.add(agent("Agent A", "curious"));
        roster.add(agent("Agent B", "analytical"));

        let replaced = roster.add(agent("Agent A", "grumpy"));

        assert_eq!(replaced.map(|a| a.personality().to_string()), Some("curious".to_string()));
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.names(), vec!["Agent A", "Agent B"]);
        assert_eq!(roster.get("Agent A").map(|a| a.personality()), Some("grumpy"));
    }

    #[test]
    fn test_third_agent_never_speaks() {
        let mut roster = Roster::new();
        roster.add(agent("Agent A", "curious"));
        roster.add(agent("Agent B", "analytical"));
        roster.add(agent("Agent C", "silent"));

        let speakers: Vec<String> = (0..6)
            .map(|i| roster.speaker_mut(i).name().to_string())
            .collect();
        assert!(!speakers.contains(&"Agent C".to_string()));
    }
}
