pub mod duel;

use serenity::builder::CreateApplicationCommands;

pub fn create_commands(commands: &mut CreateApplicationCommands) -> &mut CreateApplicationCommands {
    commands.create_application_command(|command| duel::create_duel_command(command))
}
