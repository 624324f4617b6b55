use std::{fmt, path::Path, str::FromStr};

use anyhow::bail;

/// The detected title whose format dialect decides which sub-decoders apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Game {
    MostWanted,
    Underground2,
    Underground,
    UndergroundRemake,
    World,
    Unknown,
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MostWanted => "most-wanted",
            Self::Underground2 => "underground2",
            Self::Underground => "underground",
            Self::UndergroundRemake => "underground-remake",
            Self::World => "world",
            Self::Unknown => "unknown",
        })
    }
}

impl FromStr for Game {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "most-wanted" => Ok(Self::MostWanted),
            "underground2" => Ok(Self::Underground2),
            "underground" => Ok(Self::Underground),
            "underground-remake" => Ok(Self::UndergroundRemake),
            "world" => Ok(Self::World),
            _ => bail!("invalid game name; it must be one of 'underground', 'underground2', 'most-wanted', 'underground-remake', or 'world'"),
        }
    }
}

/// Attempts to determine which game is installed in the given directory.
///
/// Underground and Most Wanted both ship a `speed.exe`, so those two are told apart by which
/// track bundles are present under `TRACKS`.
pub fn detect(directory: &Path) -> anyhow::Result<Game> {
    if directory.join("speed.exe").is_file() {
        let tracks = directory.join("TRACKS");
        if !tracks.is_dir() {
            bail!(
                "TRACKS folder does not exist in {}; cannot determine the game",
                directory.display()
            );
        }

        if tracks.join("L2RA.BUN").is_file() && tracks.join("STREAML2RA.BUN").is_file() {
            return Ok(Game::MostWanted);
        }

        if tracks.join("STREAML1RA.BUN").is_file() {
            return Ok(Game::Underground);
        }
    }

    if directory.join("speed2.exe").is_file() {
        return Ok(Game::Underground2);
    }

    if directory.join("Underground.exe").is_file() {
        return Ok(Game::UndergroundRemake);
    }

    Ok(if directory.join("nfsw.exe").is_file() {
        Game::World
    } else {
        Game::Unknown
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::Game;

    #[test]
    fn names_round_trip() {
        for game in [
            Game::MostWanted,
            Game::Underground2,
            Game::Underground,
            Game::UndergroundRemake,
            Game::World,
        ] {
            assert_eq!(Game::from_str(&game.to_string()).unwrap(), game);
        }
    }

    #[test]
    fn unknown_is_not_parseable() {
        assert!(Game::from_str("carbon").is_err());
        assert!(Game::from_str("unknown").is_err());
    }
}
