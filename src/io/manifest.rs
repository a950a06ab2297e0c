//! The `.dat` manifests (`default.dat`, `gta3.dat`) listing the definition files, placement
//! files and containers the game loads at startup, one `COMMAND argument` per line.

use log::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatCommand {
    Ide(String),
    Ipl(String),
    Img(String),
    Splash(String),
    TexDiction(String),
    ColFile { zone: u8, path: String },
    ModelFile(String),
}

fn parse_line(line: &str) -> Option<DatCommand> {
    let Some((command, argument)) = line.split_once(' ') else {
        warn!("Ignoring manifest line without argument: {}", line);
        return None;
    };
    let argument = argument.trim();

    Some(match command {
        "IDE" => DatCommand::Ide(argument.to_string()),
        "IPL" => DatCommand::Ipl(argument.to_string()),
        "IMG" => DatCommand::Img(argument.to_string()),
        "SPLASH" => DatCommand::Splash(argument.to_string()),
        "TEXDICTION" => DatCommand::TexDiction(argument.to_string()),
        "MODELFILE" => DatCommand::ModelFile(argument.to_string()),
        "COLFILE" => {
            let (zone, path) = argument.split_once(' ')?;
            let Ok(zone) = zone.parse() else {
                warn!("Invalid collision zone {} for {}", zone, path);
                return None;
            };
            DatCommand::ColFile {
                zone,
                path: path.trim().to_string(),
            }
        }
        _ => {
            warn!("Unknown manifest command {}", command);
            return None;
        }
    })
}

pub fn parse_dat(text: &str) -> Vec<DatCommand> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_line)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_known_commands() {
        let text = "# the default.dat\r\n\
            \r\n\
            IDE DATA\\DEFAULT.IDE\r\n\
            TEXDICTION MODELS\\MISC.TXD\r\n\
            MODELFILE MODELS\\GENERIC\\WHEELS.DFF\r\n\
            COLFILE 0 MODELS\\COLL\\GENERIC.COL\r\n\
            SPLASH loadsc0\r\n\
            IPL DATA\\MAPS\\INDUSTNE\\INDUSTNE.IPL\r\n\
            IMG MODELS\\GTA3.IMG\r\n";

        assert_eq!(
            parse_dat(text),
            vec![
                DatCommand::Ide(r"DATA\DEFAULT.IDE".to_string()),
                DatCommand::TexDiction(r"MODELS\MISC.TXD".to_string()),
                DatCommand::ModelFile(r"MODELS\GENERIC\WHEELS.DFF".to_string()),
                DatCommand::ColFile {
                    zone: 0,
                    path: r"MODELS\COLL\GENERIC.COL".to_string()
                },
                DatCommand::Splash("loadsc0".to_string()),
                DatCommand::Ipl(r"DATA\MAPS\INDUSTNE\INDUSTNE.IPL".to_string()),
                DatCommand::Img(r"MODELS\GTA3.IMG".to_string()),
            ]
        );
    }

    #[test]
    fn skips_what_it_does_not_understand() {
        let text = "HIERFILE data\\x.dff\nIDE\nCOLFILE x models\\coll\\a.col\nCOLFILE 1\nIDE data\\ok.ide   \n";
        assert_eq!(parse_dat(text), vec![DatCommand::Ide(r"data\ok.ide".to_string())]);
    }
}
