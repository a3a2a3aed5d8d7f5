pub mod bridgen;
