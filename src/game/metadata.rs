//! Team rosters and scores

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entities::Team;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamState {
    /// Player ids in join order
    pub players: Vec<Uuid>,
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teams {
    pub red: TeamState,
    pub blue: TeamState,
}

/// Score and roster aggregate read by the HUD
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    pub teams: Teams,
}

impl MetaData {
    pub fn team(&self, team: Team) -> &TeamState {
        match team {
            Team::Red => &self.teams.red,
            Team::Blue => &self.teams.blue,
        }
    }

    pub fn team_mut(&mut self, team: Team) -> &mut TeamState {
        match team {
            Team::Red => &mut self.teams.red,
            Team::Blue => &mut self.teams.blue,
        }
    }

    pub fn score(&self, team: Team) -> u32 {
        self.team(team).score
    }

    pub fn add_score(&mut self, team: Team) {
        let state = self.team_mut(team);
        state.score = state.score.saturating_add(1);
    }

    pub fn reset_scores(&mut self) {
        self.teams.red.score = 0;
        self.teams.blue.score = 0;
    }

    /// Put a player on a team roster, moving them off the other one
    pub fn add_player(&mut self, player_id: Uuid, team: Team) {
        self.team_mut(team.other()).players.retain(|p| *p != player_id);
        let roster = &mut self.team_mut(team).players;
        if !roster.contains(&player_id) {
            roster.push(player_id);
        }
    }

    /// Drop a player from whichever roster holds them
    pub fn remove_player(&mut self, player_id: Uuid) -> Option<Team> {
        for team in Team::ALL {
            let roster = &mut self.team_mut(team).players;
            let before = roster.len();
            roster.retain(|p| *p != player_id);
            if roster.len() != before {
                return Some(team);
            }
        }
        None
    }

    pub fn team_of(&self, player_id: Uuid) -> Option<Team> {
        Team::ALL
            .into_iter()
            .find(|team| self.team(*team).players.contains(&player_id))
    }

    /// The team with fewer players; red on a tie
    pub fn smaller_team(&self) -> Team {
        if self.teams.blue.players.len() < self.teams.red.players.len() {
            Team::Blue
        } else {
            Team::Red
        }
    }
}
